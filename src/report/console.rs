use std::io::{self, Write};

use crate::model::{format_size, CompressionResult};

const RULE: &str = "==================================================";

/// Header printed before each file
pub fn write_banner<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    writeln!(out, "PDF Compressor")?;
    writeln!(out, "{}", RULE)
}

/// Summary of a single compression
pub fn write_summary<W: Write>(out: &mut W, result: &CompressionResult) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", RULE)?;

    if !result.success {
        return writeln!(
            out,
            "FAILED: {}",
            result.error_message.as_deref().unwrap_or("unknown error")
        );
    }

    if let Some(ref path) = result.output_path {
        writeln!(out, "Output:   {}", path.display())?;
    }
    writeln!(out, "Original: {}", format_size(result.original_size_bytes))?;
    writeln!(out, "Final:    {}", format_size(result.final_size_bytes))?;
    writeln!(
        out,
        "Savings:  {:.1}% ({:.1}x smaller)",
        result.savings_percent(),
        result.reduction_ratio()
    )?;
    writeln!(out, "Step:     {}", result.step_used)?;

    if result.target_reached {
        writeln!(out, "\nTarget size reached!")
    } else {
        writeln!(out, "\nNote: Could not reach target size.")?;
        writeln!(
            out,
            "      The PDF may have large vector graphics or few compressible images."
        )
    }
}

/// Totals line for multi-file runs
pub fn write_batch_summary<W: Write>(out: &mut W, succeeded: usize, failed: usize) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", RULE)?;
    writeln!(
        out,
        "Processed {} files: {} succeeded, {} failed",
        succeeded + failed,
        succeeded,
        failed
    )
}
