use log::LevelFilter;
use simplelog::{ConfigBuilder, LevelPadding, SimpleLogger};

/// Console logger for runs without a logfire token.
///
/// Only records emitted by this crate pass the filter; `verbose` lowers the
/// level to debug.
pub fn setup_simple_logger(verbose: bool) -> anyhow::Result<()> {
    let logger_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_level_padding(LevelPadding::Right)
        .add_filter_allow_str("wa_gateway")
        .build();

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Ok(SimpleLogger::init(level, logger_config)?)
}
