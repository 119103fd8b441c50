use anyhow::{Result, anyhow};
use std::path::PathBuf;

/// Overrides shared by every binary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    /// Anything that is not a recognized flag, in order.
    pub positional: Vec<String>,
    pub help: bool,
}

impl RunArgs {
    pub fn from_env() -> Result<Self> {
        Self::parse(std::env::args().skip(1))
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = RunArgs::default();
        let mut args = args.into_iter().map(Into::<String>::into);

        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
                _ => (arg.clone(), None),
            };

            let slot = match flag.as_str() {
                "-c" | "--config" => &mut parsed.config,
                "-i" | "--input" => &mut parsed.input,
                "-o" | "--output" => &mut parsed.output,
                "-h" | "--help" => {
                    parsed.help = true;
                    continue;
                }
                _ => {
                    parsed.positional.push(arg);
                    continue;
                }
            };

            let value = match inline {
                Some(value) => value,
                None => args
                    .next()
                    .ok_or_else(|| anyhow!("Missing value for {}", flag))?,
            };
            *slot = Some(PathBuf::from(value));
        }

        Ok(parsed)
    }

    pub fn usage(binary: &str, about: &str) -> String {
        format!(
            "{about}\n\n\
             Usage: {binary} [OPTIONS]\n\n\
             Options:\n  \
               -c, --config <toml>  Config file (default: configs/catalog_audit.toml)\n  \
               -i, --input <csv>    Product CSV export\n  \
               -o, --output <dir>   Output directory\n  \
               -h, --help           Print this help\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args = RunArgs::parse([
            "--config",
            "a.toml",
            "-i",
            "products.csv",
            "--output=out",
            "FWDR25SS014G",
        ])
        .unwrap();

        assert_eq!(args.config, Some(PathBuf::from("a.toml")));
        assert_eq!(args.input, Some(PathBuf::from("products.csv")));
        assert_eq!(args.output, Some(PathBuf::from("out")));
        assert_eq!(args.positional, vec!["FWDR25SS014G".to_string()]);
        assert!(!args.help);
    }

    #[test]
    fn test_help_and_missing_value() {
        assert!(RunArgs::parse(["-h"]).unwrap().help);
        assert!(RunArgs::parse(["--input"]).is_err());
        assert_eq!(RunArgs::parse(Vec::<String>::new()).unwrap(), RunArgs::default());
    }

    #[test]
    fn test_usage_mentions_flags() {
        let usage = RunArgs::usage("fix_categories", "Fix categories");
        assert!(usage.contains("--config"));
        assert!(usage.contains("Usage: fix_categories"));
    }
}
