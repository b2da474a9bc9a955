//! Check kernel asset and configuration status.

use flowscope_common::config::AppConfig;
use flowscope_flow_core::kernel::KernelProgram;

pub fn run() -> anyhow::Result<()> {
    let config = AppConfig::load();

    println!("Capture defaults:");
    println!(
        "  Raw buffers: {}x{} @ {}fps",
        config.capture.width, config.capture.height, config.capture.fps
    );
    println!(
        "  Normalized frames: {}x{} (quarter-turn corrected)",
        config.capture.height, config.capture.width
    );
    println!();

    println!("Kernel descriptor: {}", config.kernel_asset.display());
    match KernelProgram::load(&config.kernel_asset) {
        Ok(program) => {
            println!("  Tile size: {} px", program.tile_size);
            println!("  Max magnitude: {} px", program.max_magnitude);
            println!("  Visibility floor: {} px", program.min_visible_magnitude);
            println!("\nVisualization available.");
        }
        Err(e) => {
            println!("  Unavailable: {e}");
            println!("\nThe pipeline will run without display output.");
        }
    }

    Ok(())
}
