use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// How the one-shot commands print their result. The long-running service
/// ignores this and logs through tracing instead.
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
    pub use_color: bool,
}

impl OutputOptions {
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

/// Color only when allowed by the flag, not vetoed by `NO_COLOR`, and
/// stdout is a terminal.
pub fn detect_color(color_flag: bool) -> bool {
    if !color_flag {
        return false;
    }
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    std::io::stdout().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_flag_wins_over_everything() {
        assert!(!detect_color(false));
    }

    #[test]
    fn json_mode_detection() {
        let opts = OutputOptions {
            format: OutputFormat::Json,
            pretty: false,
            use_color: false,
        };
        assert!(opts.is_json());
        let opts = OutputOptions {
            format: OutputFormat::Text,
            pretty: false,
            use_color: false,
        };
        assert!(!opts.is_json());
    }
}
