//! Toolchain profiles
//!
//! A [`ToolchainProfile`] is the immutable answer to "how do I compile, link
//! and name things on this platform with this compiler family". It is chosen
//! once per run by [`ToolchainProfile::resolve`] from a single
//! `(Platform, CompilerFamily)` match; everything downstream asks the profile
//! instead of branching on the platform again.

use crate::error::{BuildError, BuildResult};
use crate::graph::{DepListing, Rule};
use crate::platform::Platform;
use crate::profile::{OptLevel, ProfileConfig};
use kiln_config::ProjectKind;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const COMPILE_RULE: &str = "compile";
pub const LINK_RULE: &str = "link";
pub const ARCHIVE_RULE: &str = "archive";
pub const PCH_RULE: &str = "pch";

const DEFAULT_STANDARD: &str = "c++17";

/// Compiler family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerFamily {
    Gcc,
    Clang,
    Msvc,
}

impl CompilerFamily {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gcc => "gcc",
            Self::Clang => "clang",
            Self::Msvc => "msvc",
        }
    }
}

impl FromStr for CompilerFamily {
    type Err = BuildError;

    fn from_str(s: &str) -> BuildResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "gcc" | "g++" => Ok(Self::Gcc),
            "clang" | "clang++" => Ok(Self::Clang),
            "msvc" | "cl" => Ok(Self::Msvc),
            other => Err(BuildError::Configuration(format!(
                "unknown compiler family '{}' (expected gcc, clang or msvc)",
                other
            ))),
        }
    }
}

impl fmt::Display for CompilerFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Header dependency listing format, as Ninja's `deps` binding names it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepsFormat {
    /// Make-style depfile written by `-MD -MF`
    Gcc,
    /// `/showIncludes` lines on stdout
    Msvc,
}

impl DepsFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gcc => "gcc",
            Self::Msvc => "msvc",
        }
    }
}

/// Command-line flag syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagStyle {
    /// `-I`, `-D`, `-L`, `-l`
    Gnu,
    /// `/I`, `/D`, `/LIBPATH:`, `x.lib`
    Msvc,
}

/// What a link step produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Executable,
    SharedLibrary,
    StaticLibrary,
}

impl ArtifactKind {
    /// Whether dependents can link against this artifact
    pub fn is_library(&self) -> bool {
        !matches!(self, Self::Executable)
    }
}

impl From<ProjectKind> for ArtifactKind {
    fn from(kind: ProjectKind) -> Self {
        match kind {
            ProjectKind::Executable => Self::Executable,
            ProjectKind::Shared => Self::SharedLibrary,
            ProjectKind::Static => Self::StaticLibrary,
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Executable => "executable",
            Self::SharedLibrary => "shared library",
            Self::StaticLibrary => "static library",
        };
        f.write_str(name)
    }
}

/// Options rendered into the compiler argument template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub include_dirs: Vec<PathBuf>,
    pub defines: Vec<String>,
    pub extra_flags: Vec<String>,
    pub standard: Option<String>,
    pub suppress_warnings: bool,
}

/// Options rendered into the linker argument template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkOptions {
    pub library_dirs: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub extra_flags: Vec<String>,
}

/// Invocation conventions for one (platform, compiler family) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainProfile {
    platform: Platform,
    family: CompilerFamily,
    compiler: &'static str,
    linker: &'static str,
    archiver: &'static str,
    compile_style: FlagStyle,
    link_style: FlagStyle,
    deps_format: DepsFormat,
    object_extension: &'static str,
    pch_extension: &'static str,
}

impl ToolchainProfile {
    /// Select the profile for a platform, optionally overriding the family
    pub fn resolve(platform: Platform, family: Option<CompilerFamily>) -> BuildResult<Self> {
        use CompilerFamily::*;
        use FlagStyle as S;
        use Platform::*;

        let family = family.unwrap_or(match platform {
            Windows => Msvc,
            Linux => Gcc,
            MacOs => Clang,
        });

        let (compiler, linker, archiver, compile_style, link_style) = match (platform, family) {
            (Windows, Msvc) => ("cl", "link", "lib", S::Msvc, S::Msvc),
            (Windows, Clang) => ("clang++", "lld-link", "llvm-lib", S::Gnu, S::Msvc),
            (Windows, Gcc) => ("g++", "g++", "ar", S::Gnu, S::Gnu),
            (Linux | MacOs, Gcc) => ("g++", "g++", "ar", S::Gnu, S::Gnu),
            (Linux | MacOs, Clang) => ("clang++", "clang++", "ar", S::Gnu, S::Gnu),
            (Linux | MacOs, Msvc) => {
                return Err(BuildError::UnsupportedToolchain {
                    platform: platform.to_string(),
                    family: family.to_string(),
                })
            }
        };

        let deps_format = match compile_style {
            S::Gnu => DepsFormat::Gcc,
            S::Msvc => DepsFormat::Msvc,
        };

        Ok(Self {
            platform,
            family,
            compiler,
            linker,
            archiver,
            compile_style,
            link_style,
            deps_format,
            object_extension: if platform.is_windows() { "obj" } else { "o" },
            pch_extension: if family == Gcc { "gch" } else { "pch" },
        })
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn family(&self) -> CompilerFamily {
        self.family
    }

    pub fn compiler(&self) -> &str {
        self.compiler
    }

    pub fn linker(&self) -> &str {
        self.linker
    }

    pub fn archiver(&self) -> &str {
        self.archiver
    }

    pub fn compile_style(&self) -> FlagStyle {
        self.compile_style
    }

    pub fn link_style(&self) -> FlagStyle {
        self.link_style
    }

    pub fn deps_format(&self) -> DepsFormat {
        self.deps_format
    }

    pub fn object_extension(&self) -> &str {
        self.object_extension
    }

    /// File name of the artifact `base` builds into
    pub fn artifact_name(&self, base: &str, kind: ArtifactKind) -> String {
        let ext = match (self.platform.is_windows(), kind) {
            (true, ArtifactKind::Executable) => "exe",
            (true, ArtifactKind::SharedLibrary) => "dll",
            (true, ArtifactKind::StaticLibrary) => "lib",
            (false, ArtifactKind::Executable) => "out",
            (false, ArtifactKind::SharedLibrary) => "so",
            (false, ArtifactKind::StaticLibrary) => "a",
        };
        format!("{}.{}", base, ext)
    }

    /// Import library written next to a Windows DLL
    pub fn import_library(&self, base: &str, kind: ArtifactKind) -> Option<String> {
        (self.platform.is_windows() && kind == ArtifactKind::SharedLibrary)
            .then(|| format!("{}.lib", base))
    }

    /// File a dependent project links against
    pub fn linkable_name(&self, base: &str, kind: ArtifactKind) -> String {
        self.import_library(base, kind)
            .unwrap_or_else(|| self.artifact_name(base, kind))
    }

    /// Object file name for a source: its file name with the extension swapped
    pub fn object_name(&self, source: &Path) -> String {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}.{}", stem, self.object_extension)
    }

    /// Compiled header name for a header
    pub fn pch_name(&self, header: &Path) -> String {
        let name = header
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}.{}", name, self.pch_extension)
    }

    /// Object the MSVC compiler emits alongside a precompiled header
    pub fn pch_object(&self, pch: &Path) -> Option<PathBuf> {
        (self.compile_style == FlagStyle::Msvc).then(|| pch.with_extension(self.object_extension))
    }

    /// Dependency listing declaration for an object
    pub fn dep_listing(&self, object: &Path) -> DepListing {
        let path = match self.deps_format {
            DepsFormat::Gcc => {
                let mut listing = object.as_os_str().to_owned();
                listing.push(".d");
                Some(PathBuf::from(listing))
            }
            DepsFormat::Msvc => None,
        };
        DepListing {
            format: self.deps_format,
            path,
        }
    }

    /// Compiler arguments shared by every compile node of one project
    pub fn compile_args(
        &self,
        options: &CompileOptions,
        profile: &ProfileConfig,
        kind: ArtifactKind,
    ) -> Vec<String> {
        let standard = options.standard.as_deref().unwrap_or(DEFAULT_STANDARD);
        let defines = profile.defines.iter().chain(options.defines.iter());
        let mut args = Vec::new();

        match self.compile_style {
            FlagStyle::Gnu => {
                args.push(format!("-std={}", standard));
                args.push(format!("-O{}", profile.opt_level.level()));
                if profile.debug_info {
                    args.push("-g".to_string());
                }
                if options.suppress_warnings {
                    args.push("-w".to_string());
                }
                if !self.platform.is_windows() && kind == ArtifactKind::SharedLibrary {
                    args.push("-fPIC".to_string());
                }
                args.extend(defines.map(|d| format!("-D{}", d)));
                args.extend(
                    options
                        .include_dirs
                        .iter()
                        .map(|dir| format!("-I{}", path_arg(dir))),
                );
            }
            FlagStyle::Msvc => {
                args.push(format!("/std:{}", standard));
                args.push("/EHsc".to_string());
                args.push(
                    match profile.opt_level {
                        OptLevel::O0 => "/Od",
                        OptLevel::O1 => "/O1",
                        OptLevel::O2 => "/O2",
                        OptLevel::O3 => "/Ox",
                    }
                    .to_string(),
                );
                if profile.debug_info {
                    args.push("/Zi".to_string());
                    args.push("/FS".to_string());
                }
                if options.suppress_warnings {
                    args.push("/w".to_string());
                }
                args.extend(defines.map(|d| format!("/D{}", d)));
                args.extend(
                    options
                        .include_dirs
                        .iter()
                        .map(|dir| format!("/I{}", path_arg(dir))),
                );
            }
        }

        args.extend(options.extra_flags.iter().cloned());
        args
    }

    /// Linker arguments for the project's link node
    pub fn link_args(
        &self,
        options: &LinkOptions,
        profile: &ProfileConfig,
        kind: ArtifactKind,
    ) -> Vec<String> {
        let mut args = Vec::new();

        match self.link_style {
            FlagStyle::Gnu => {
                if kind == ArtifactKind::SharedLibrary {
                    args.push("-shared".to_string());
                }
                args.extend(
                    options
                        .library_dirs
                        .iter()
                        .map(|dir| format!("-L{}", path_arg(dir))),
                );
                args.extend(options.libraries.iter().map(|lib| format!("-l{}", lib)));
            }
            FlagStyle::Msvc => {
                if kind == ArtifactKind::SharedLibrary {
                    args.push("/DLL".to_string());
                }
                if profile.debug_info {
                    args.push("/DEBUG".to_string());
                }
                args.extend(
                    options
                        .library_dirs
                        .iter()
                        .map(|dir| format!("/LIBPATH:{}", path_arg(dir))),
                );
                args.extend(options.libraries.iter().map(|lib| {
                    if lib.to_lowercase().ends_with(".lib") {
                        lib.clone()
                    } else {
                        format!("{}.lib", lib)
                    }
                }));
            }
        }

        args.extend(options.extra_flags.iter().cloned());
        args
    }

    /// Flags that make a compile node use a precompiled header
    pub fn pch_use_flags(&self, pch: &Path, header: &Path) -> Vec<String> {
        match (self.compile_style, self.family) {
            (FlagStyle::Msvc, _) => {
                let header_name = header
                    .file_name()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                vec![
                    format!("/FI{}", header_name),
                    format!("/Yu{}", header_name),
                    format!("/Fp{}", path_arg(pch)),
                ]
            }
            (FlagStyle::Gnu, CompilerFamily::Clang) => {
                vec!["-include-pch".to_string(), path_arg(pch)]
            }
            (FlagStyle::Gnu, _) => {
                // gcc picks up `<name>.gch` when asked to include `<name>`
                vec!["-include".to_string(), path_arg(&pch.with_extension(""))]
            }
        }
    }

    /// Rule compiling one translation unit, bound to this profile's listing format
    pub fn compile_rule(&self) -> Rule {
        match self.compile_style {
            FlagStyle::Gnu => Rule::new(
                COMPILE_RULE,
                "$cxx -MD -MF $out.d $compiler_args $pch_flags -c $in -o $out",
            )
            .with_description("BUILD $out")
            .with_deps(self.deps_format, Some("$out.d".to_string())),
            FlagStyle::Msvc => Rule::new(
                COMPILE_RULE,
                "$cxx /nologo /showIncludes $compiler_args $pch_flags /c $in /Fo$out",
            )
            .with_description("BUILD $out")
            .with_deps(self.deps_format, None),
        }
    }

    /// Rule producing the project's artifact
    pub fn link_rule(&self, kind: ArtifactKind) -> Rule {
        let implib = self.platform.is_windows() && kind == ArtifactKind::SharedLibrary;
        match (kind, self.link_style) {
            (ArtifactKind::StaticLibrary, FlagStyle::Gnu) => {
                Rule::new(ARCHIVE_RULE, "$ar rcs $out $in").with_description("ARCHIVE $out")
            }
            (ArtifactKind::StaticLibrary, FlagStyle::Msvc) => {
                Rule::new(ARCHIVE_RULE, "$ar /nologo /OUT:$out $in")
                    .with_description("ARCHIVE $out")
            }
            (_, FlagStyle::Gnu) => {
                let mut command = "$ld -o $out $in $linker_args".to_string();
                if implib {
                    command.push_str(" -Wl,--out-implib,$implib");
                }
                Rule::new(LINK_RULE, command).with_description("LINK $out")
            }
            (_, FlagStyle::Msvc) => {
                let mut command = "$ld /nologo /OUT:$out $in $linker_args".to_string();
                if implib {
                    command.push_str(" /IMPLIB:$implib");
                }
                Rule::new(LINK_RULE, command).with_description("LINK $out")
            }
        }
    }

    /// Rule compiling a header into a precompiled header
    pub fn pch_rule(&self) -> Rule {
        match self.compile_style {
            FlagStyle::Gnu => Rule::new(
                PCH_RULE,
                "$cxx $compiler_args -x c++-header -c $in -o $out",
            )
            .with_description("PCH $out"),
            FlagStyle::Msvc => Rule::new(
                PCH_RULE,
                "$cxx /nologo $compiler_args /TP /Yc /Fp$out /Fo$pch_obj /c $in",
            )
            .with_description("PCH $out"),
        }
    }
}

/// Render a path as a single command-line argument
pub fn path_arg(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    if text.contains(char::is_whitespace) {
        format!("\"{}\"", text)
    } else {
        text
    }
}
