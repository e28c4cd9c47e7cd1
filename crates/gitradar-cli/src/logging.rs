use std::fs::{self, OpenOptions};
use std::io::Write;

use env_logger::{Builder, Env, Target};
use gitradar_core::config::log_file_location;

fn builder() -> Builder {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        let target = record
            .target()
            .strip_prefix("gitradar_core::")
            .unwrap_or(record.target());
        writeln!(
            buf,
            "[{}] {} - {} {}",
            record.level(),
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
            target.replace("::", "/"),
            record.args()
        )
    });
    builder
}

/// Logs go to stderr. For the one-shot commands.
pub fn init_stderr() {
    // only fails when a logger is already installed
    let _ = builder().target(Target::Stderr).try_init();
}

/// The dashboard owns the terminal, so its logs go to `git-radar.log` in the
/// cache directory. Without a writable log file logging stays off.
pub fn init_to_file() {
    let Ok(path) = log_file_location() else {
        return;
    };
    if let Some(parent) = path.parent()
        && fs::create_dir_all(parent).is_err()
    {
        return;
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };
    let _ = builder().target(Target::Pipe(Box::new(file))).try_init();
}
