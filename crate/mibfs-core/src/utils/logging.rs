use std::io::Write as _;

/// Initialize logging for the current process.
///
/// The default log level is WARN, overridable by setting the env
/// variable RUST_LOG. The modules passed to this function log at
/// INFO by default.
///
/// Set RUST_LOG_FORMAT=SYSTEMD to log in a systemd-friendly format.
pub fn init_with_info_modules(info_modules: Vec<&str>) {
    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG_FORMAT").is_ok_and(|format| format == "SYSTEMD") {
        // Prefix log lines with the syslog priority (RFC 5424), so
        // systemd assigns the right level to each entry. Time is
        // tracked by the journal.
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "<{}>{}: {}",
                match record.level() {
                    log::Level::Error => 3,
                    log::Level::Warn => 4,
                    log::Level::Info => 5,
                    log::Level::Debug | log::Level::Trace => 7,
                },
                record.target(),
                record.args()
            )
        });
    }

    builder.filter_level(log::LevelFilter::Warn);
    for module in info_modules {
        builder.filter_module(module, log::LevelFilter::Info);
    }

    builder.parse_default_env();
    builder.init();
}
