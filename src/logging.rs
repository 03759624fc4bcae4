/// Initializes the logger with the `env_logger` crate. Safe to call more
/// than once; later calls are no-ops.
pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env().try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logger_is_idempotent() {
        init_logger();
        init_logger();
        log::debug!("logger initialized twice without panicking");
    }
}
