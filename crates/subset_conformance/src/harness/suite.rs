//! Test-suite loading
//!
//! A suite file lists fonts, profiles, subsets and variable-font instances in
//! named sections; the cross product of those lists is the set of test cases.
//!
//! ```text
//! FONTS:
//! Roboto-Regular.abc.ttf
//!
//! PROFILES:
//! default.txt
//! drop-hints.txt
//!
//! SUBSETS:
//! abc
//! U+0041,U+0042
//! *
//! ```
//!
//! For a suite at `<data>/tests/<name>.tests`, fonts live in `<data>/fonts`,
//! profiles in `<data>/profiles` and recorded outputs in
//! `<data>/expected/<name>`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Errors that can occur when loading a suite
#[derive(Debug, Error)]
pub enum SuiteError {
    /// IO error reading the suite file
    #[error("IO error reading {path}: {error}")]
    Io { path: String, error: String },

    /// A value line before any section header
    #[error("{path}:{line}: {content:?} appears before any section header")]
    OrphanValue {
        path: String,
        line: usize,
        content: String,
    },

    /// A referenced profile could not be read
    #[error("cannot read profile {path}: {error}")]
    Profile { path: String, error: String },
}

/// Result type for suite operations
pub type SuiteResult<T> = Result<T, SuiteError>;

/// Subset value meaning "keep every code point"
pub const ALL_UNICODES: &str = "*";

/// Subset value meaning "keep no code points"
pub const NO_UNICODES: &str = "no-unicodes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Fonts,
    Profiles,
    Subsets,
    Instances,
    IupOptions,
    Options,
}

impl Section {
    fn from_header(line: &str) -> Option<Self> {
        match line {
            "FONTS:" => Some(Self::Fonts),
            "PROFILES:" => Some(Self::Profiles),
            "SUBSETS:" => Some(Self::Subsets),
            "INSTANCES:" => Some(Self::Instances),
            "IUP_OPTIONS:" => Some(Self::IupOptions),
            "OPTIONS:" => Some(Self::Options),
            _ => None,
        }
    }
}

/// Translate a SUBSETS value into the engine's `--unicodes` syntax
pub fn unicodes_for_subset(subset: &str) -> String {
    if subset == ALL_UNICODES {
        ALL_UNICODES.to_string()
    } else if subset == NO_UNICODES {
        String::new()
    } else if subset.starts_with("U+") {
        subset.replace("U+", "")
    } else {
        subset
            .chars()
            .map(|c| format!("{:X}", u32::from(c)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

fn instance_suffix(instance: &str, optimize: bool) -> String {
    if instance.is_empty() {
        return String::new();
    }
    let mut suffix = format!(".{}", instance.replace(':', "-"));
    if optimize {
        suffix.push_str(".iup_optimize");
    }
    suffix
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// One subsetting scenario
///
/// Immutable once built; the runner only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    font_path: PathBuf,
    profile_path: PathBuf,
    profile_flags: Vec<String>,
    unicodes: String,
    instance_flags: Vec<String>,
    optimize: bool,
    display_name: String,
    font_extension: String,
    expected_path: PathBuf,
}

impl TestCase {
    /// Build a case from raw suite values
    ///
    /// `subset` is a SUBSETS entry, `instance` an INSTANCES entry (empty for
    /// none). The expected output is looked up in `expected_dir` by display
    /// name.
    pub fn new(
        font_path: impl Into<PathBuf>,
        profile_path: impl Into<PathBuf>,
        profile_flags: Vec<String>,
        subset: &str,
        instance: &str,
        optimize: bool,
        expected_dir: &Path,
    ) -> Self {
        let font_path = font_path.into();
        let profile_path = profile_path.into();
        let unicodes = unicodes_for_subset(subset);

        let font_extension = font_path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let tag = if unicodes == ALL_UNICODES {
            "all"
        } else if unicodes.is_empty() {
            NO_UNICODES
        } else {
            unicodes.as_str()
        };
        let display_name = format!(
            "{}.{}.{}{}{}",
            file_stem(&font_path),
            file_stem(&profile_path),
            tag,
            instance_suffix(instance, optimize),
            font_extension
        );

        let instance_flags = if instance.is_empty() {
            Vec::new()
        } else {
            instance.split(',').map(str::to_string).collect()
        };

        Self {
            expected_path: expected_dir.join(&display_name),
            font_path,
            profile_path,
            profile_flags,
            unicodes,
            instance_flags,
            optimize,
            display_name,
            font_extension,
        }
    }

    /// Source font
    pub fn font_path(&self) -> &Path {
        &self.font_path
    }

    /// Profile the flags were read from
    pub fn profile_path(&self) -> &Path {
        &self.profile_path
    }

    /// Flags contributed by the profile, in file order
    pub fn profile_flags(&self) -> &[String] {
        &self.profile_flags
    }

    /// Value for `--unicodes=`
    pub fn unicodes(&self) -> &str {
        &self.unicodes
    }

    /// Instance axis settings; empty when the case does not instance
    pub fn instance_flags(&self) -> &[String] {
        &self.instance_flags
    }

    /// Whether the extra optimization pass is requested
    pub fn optimize(&self) -> bool {
        self.optimize
    }

    /// Unique name of the case within a suite
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Extension of the source font, including the dot
    pub fn font_extension(&self) -> &str {
        &self.font_extension
    }

    /// Recorded output this case is compared against
    pub fn expected_path(&self) -> &Path {
        &self.expected_path
    }

    /// File name for the produced font of one variant
    pub fn output_file_name(&self, preprocess: bool) -> String {
        let variant = if preprocess { "-preprocess" } else { "" };
        format!(
            "{}-subset{}{}",
            self.display_name, variant, self.font_extension
        )
    }

    /// Description used on the report line of one variant
    pub fn description(&self, preprocess: bool) -> String {
        if preprocess {
            format!("{} (preprocess)", self.display_name)
        } else {
            self.display_name.clone()
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

/// A parsed suite file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSuite {
    path: PathBuf,
    fonts: Vec<String>,
    profiles: Vec<String>,
    subsets: Vec<String>,
    instances: Vec<String>,
    iup_options: Vec<String>,
    options: Vec<String>,
}

impl TestSuite {
    /// Read and parse a suite file
    pub fn load(path: impl AsRef<Path>) -> SuiteResult<Self> {
        let path = path.as_ref();
        let definition = fs::read_to_string(path).map_err(|e| SuiteError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(path, &definition)
    }

    /// Parse suite text; `path` anchors the data directory
    pub fn parse(path: impl AsRef<Path>, definition: &str) -> SuiteResult<Self> {
        let mut suite = Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        };
        let mut current: Option<Section> = None;

        for (index, raw) in definition.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(section) = Section::from_header(line) {
                current = Some(section);
                continue;
            }

            let Some(section) = current else {
                return Err(SuiteError::OrphanValue {
                    path: suite.path.display().to_string(),
                    line: index + 1,
                    content: line.to_string(),
                });
            };

            let value = line.to_string();
            match section {
                Section::Fonts => suite.fonts.push(value),
                Section::Profiles => suite.profiles.push(value),
                Section::Subsets => suite.subsets.push(value),
                Section::Instances => suite.instances.push(value),
                Section::IupOptions => suite.iup_options.push(value),
                Section::Options => suite.options.push(value),
            }
        }

        if !suite.options.is_empty() {
            debug!(suite = %suite.path.display(), options = ?suite.options, "ignoring suite options");
        }

        Ok(suite)
    }

    /// Path of the suite file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Suite name (file stem)
    pub fn name(&self) -> String {
        file_stem(&self.path)
    }

    /// Root of the data tree the suite belongs to: `<suite dir>/..`
    ///
    /// The `..` is kept literally so a bare `basics.tests` run from inside
    /// `tests/` still resolves to the sibling `fonts/` directory.
    pub fn data_dir(&self) -> PathBuf {
        self.path.parent().unwrap_or(Path::new("")).join("..")
    }

    /// Directory holding the source fonts
    pub fn fonts_dir(&self) -> PathBuf {
        self.data_dir().join("fonts")
    }

    /// Directory holding the profiles
    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir().join("profiles")
    }

    /// Directory holding this suite's recorded outputs
    pub fn expected_dir(&self) -> PathBuf {
        self.data_dir().join("expected").join(self.name())
    }

    /// FONTS entries
    pub fn fonts(&self) -> &[String] {
        &self.fonts
    }

    /// PROFILES entries
    pub fn profiles(&self) -> &[String] {
        &self.profiles
    }

    /// SUBSETS entries
    pub fn subsets(&self) -> &[String] {
        &self.subsets
    }

    /// INSTANCES entries
    pub fn instances(&self) -> &[String] {
        &self.instances
    }

    /// Expand the suite into test cases
    ///
    /// Order is fonts, then profiles, then subsets, then instances, then IUP
    /// options. Each profile file is read once.
    pub fn cases(&self) -> SuiteResult<Vec<TestCase>> {
        let expected_dir = self.expected_dir();
        let fonts_dir = self.fonts_dir();
        let profiles_dir = self.profiles_dir();

        let profiles = self
            .profiles
            .iter()
            .map(|name| {
                let path = profiles_dir.join(name);
                read_profile_flags(&path).map(|flags| (path, flags))
            })
            .collect::<SuiteResult<Vec<_>>>()?;

        // (instance, optimize) pairs; a single non-instancing entry when the
        // suite has no INSTANCES section.
        let mut variants: Vec<(&str, bool)> = Vec::new();
        if self.instances.is_empty() {
            variants.push(("", false));
        }
        for instance in &self.instances {
            if self.iup_options.is_empty() {
                variants.push((instance, false));
            }
            for option in &self.iup_options {
                variants.push((instance, option == "Yes"));
            }
        }

        let mut cases = Vec::new();
        for font in &self.fonts {
            let font_path = fonts_dir.join(font);
            for (profile_path, flags) in &profiles {
                for subset in &self.subsets {
                    for &(instance, optimize) in &variants {
                        cases.push(TestCase::new(
                            font_path.clone(),
                            profile_path.clone(),
                            flags.clone(),
                            subset,
                            instance,
                            optimize,
                            &expected_dir,
                        ));
                    }
                }
            }
        }

        Ok(cases)
    }
}

/// Non-empty, trimmed lines of a profile file
pub fn read_profile_flags(path: &Path) -> SuiteResult<Vec<String>> {
    let content = fs::read_to_string(path).map_err(|e| SuiteError::Profile {
        path: path.display().to_string(),
        error: e.to_string(),
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
