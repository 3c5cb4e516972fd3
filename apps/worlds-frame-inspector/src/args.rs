//! Command line options.

use std::path::PathBuf;

/// Options parsed from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectorArgs {
    /// Asset root directory.
    pub assets: Option<PathBuf>,
    /// Material documents to load, in order.
    pub materials: Vec<String>,
    /// Environment cubemap document.
    pub cubemap: Option<String>,
    /// Worker thread count override.
    pub workers: Option<usize>,
    /// Add the blur pass.
    pub blur: bool,
}

impl InspectorArgs {
    /// Parse options from the process arguments.
    pub fn from_args() -> Self {
        Self::parse(std::env::args().skip(1))
    }

    /// Parse options, ignoring unknown flags and unparsable values.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let mut parsed = Self::default();

        let mut i = 0;
        while i < args.len() {
            let value = args.get(i + 1);
            match (args[i].as_str(), value) {
                ("--assets", Some(v)) => {
                    parsed.assets = Some(PathBuf::from(v));
                    i += 1;
                }
                ("--material", Some(v)) => {
                    parsed.materials.push(v.clone());
                    i += 1;
                }
                ("--cubemap", Some(v)) => {
                    parsed.cubemap = Some(v.clone());
                    i += 1;
                }
                ("--workers", Some(v)) => {
                    if let Ok(n) = v.parse() {
                        parsed.workers = Some(n);
                        i += 1;
                    }
                }
                ("--blur", _) => parsed.blur = true,
                _ => {}
            }
            i += 1;
        }

        parsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_flags() {
        let args = InspectorArgs::parse([
            "--assets",
            "data",
            "--material",
            "Materials/a.json",
            "--material",
            "Materials/b.json",
            "--cubemap",
            "Cubemaps/sky.json",
            "--workers",
            "3",
            "--blur",
        ]);

        assert_eq!(args.assets, Some(PathBuf::from("data")));
        assert_eq!(args.materials, ["Materials/a.json", "Materials/b.json"]);
        assert_eq!(args.cubemap.as_deref(), Some("Cubemaps/sky.json"));
        assert_eq!(args.workers, Some(3));
        assert!(args.blur);
    }

    #[test]
    fn ignores_bad_values() {
        let args = InspectorArgs::parse(["--workers", "many", "--unknown", "--assets"]);
        assert_eq!(args, InspectorArgs::default());
    }
}
