//! Asset Processors - Publishing Collaborators
//!
//! A processor turns one collected source file into its public,
//! content-addressed output. External compilers are located with
//! `which` once, when the processor is built.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::config::{BuildConfig, Compression};
use crate::log::Logger;
use crate::manifest::{AssetEntry, Manifest};
use crate::pipeline::PipelineError;
use crate::public_path::{filename_with_fingerprint, substitute_asset_paths};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Written,
    /// Deliberately produced nothing (e.g. a stylesheet partial).
    Skipped,
}

pub struct ProcessContext<'a> {
    pub manifest: &'a Manifest,
    pub config: &'a BuildConfig,
    pub logger: &'a Logger,
}

/// Processor trait - one source file in, one public file out
pub trait Processor {
    fn name(&self) -> &'static str;
    fn handles(&self, input: &Path) -> bool;
    fn process(
        &self,
        entry: &AssetEntry,
        output: &Path,
        ctx: &ProcessContext<'_>,
    ) -> Result<Outcome, PipelineError>;
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| extensions.contains(&e))
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io { path: path.to_path_buf(), source }
}

fn write_output(output: &Path, contents: &[u8]) -> Result<(), PipelineError> {
    fs::write(output, contents).map_err(io_error(output))
}

/// Run `command`, feeding `stdin` when given; returns stdout.
fn run_capture(command: &mut Command, input: &Path, stdin: Option<&[u8]>) -> Result<Vec<u8>, PipelineError> {
    let failure = |message: String| PipelineError::Processor { path: input.to_path_buf(), message };

    command
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command.spawn().map_err(|e| failure(e.to_string()))?;
    if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(data).map_err(|e| failure(e.to_string()))?;
    }
    let output = child.wait_with_output().map_err(|e| failure(e.to_string()))?;
    if !output.status.success() {
        return Err(failure(String::from_utf8_lossy(&output.stderr).trim().to_string()));
    }
    Ok(output.stdout)
}

// --- Concrete Processors ---

pub struct CopyProcessor;

impl Processor for CopyProcessor {
    fn name(&self) -> &'static str { "copy" }

    fn handles(&self, _input: &Path) -> bool { true }

    fn process(
        &self,
        entry: &AssetEntry,
        output: &Path,
        ctx: &ProcessContext<'_>,
    ) -> Result<Outcome, PipelineError> {
        let input = Path::new(&entry.source_path);
        fs::copy(input, output).map_err(io_error(input))?;
        ctx.logger.debug("publish", format!("Copied `{}` to `{}`", input.display(), output.display()));
        Ok(Outcome::Written)
    }
}

/// Sass compilers, in order of preference, with their flags.
const SASS_CANDIDATES: &[(&str, &[&str], &[&str])] = &[
    ("sass", &["--style=compressed"], &["--embed-source-map"]),
    ("scss", &["--style", "compressed"], &["--sourcemap=inline"]),
    ("node-sass", &["--output-style", "compressed"], &["--source-map-embed"]),
];

pub struct StylesheetProcessor {
    compiler: Option<(PathBuf, usize)>,
}

impl StylesheetProcessor {
    /// Locate the first available sass compiler on `PATH`.
    pub fn detect() -> Self {
        let compiler = SASS_CANDIDATES
            .iter()
            .enumerate()
            .find_map(|(i, (program, _, _))| which::which(program).ok().map(|p| (p, i)));
        Self { compiler }
    }

    pub fn without_compiler() -> Self {
        Self { compiler: None }
    }
}

/// Sass partials (`_name.scss`) are imported, never published.
pub fn is_stylesheet_partial(input: &Path) -> bool {
    has_extension(input, &["scss", "sass"])
        && input
            .file_name()
            .map_or(false, |n| n.to_string_lossy().starts_with('_'))
}

impl Processor for StylesheetProcessor {
    fn name(&self) -> &'static str { "stylesheet" }

    fn handles(&self, input: &Path) -> bool {
        has_extension(input, &["scss", "sass"])
    }

    fn process(
        &self,
        entry: &AssetEntry,
        output: &Path,
        ctx: &ProcessContext<'_>,
    ) -> Result<Outcome, PipelineError> {
        let input = Path::new(&entry.source_path);
        if is_stylesheet_partial(input) {
            return Ok(Outcome::Skipped);
        }

        let Some((program, candidate)) = &self.compiler else {
            let looked_for: Vec<_> = SASS_CANDIDATES.iter().map(|(p, _, _)| *p).collect();
            return Err(PipelineError::Processor {
                path: input.to_path_buf(),
                message: format!("Sass not found. Looked for: {}", looked_for.join(", ")),
            });
        };
        let (_, style, source_map) = SASS_CANDIDATES[*candidate];

        let mut command = Command::new(program);
        command.args(style);
        if ctx.config.source_maps {
            command.args(source_map);
        }
        command.arg(input);
        let css = run_capture(&mut command, input, None)?;

        let css = String::from_utf8_lossy(&css);
        let css = substitute_asset_paths(&css, ctx.manifest, &ctx.config.public_scope)?;
        write_output(output, css.as_bytes())?;
        ctx.logger.log(
            "publish",
            format!("Generated css for `{}` at `{}`", input.display(), output.display()),
        );
        Ok(Outcome::Written)
    }
}

pub struct ScriptProcessor {
    minifier: Option<PathBuf>,
}

impl ScriptProcessor {
    pub fn detect() -> Self {
        Self { minifier: which::which("uglifyjs").ok() }
    }

    pub fn without_minifier() -> Self {
        Self { minifier: None }
    }

    /// Point `'<name>.wasm'` literals at the published sibling module.
    fn link_wasm(entry: &AssetEntry, contents: String, ctx: &ProcessContext<'_>) -> String {
        let wasm_alias = Path::new(&entry.alias).with_extension("wasm");
        let wasm_alias = wasm_alias.to_string_lossy().replace('\\', "/");
        let Some(wasm) = ctx.manifest.lookup_by_alias(&wasm_alias) else {
            return contents;
        };
        let Some(file_name) = Path::new(&wasm.source_path).file_name() else {
            return contents;
        };
        let literal = format!("'{}'", file_name.to_string_lossy());
        let public = format!("'{}'", wasm.public_path(&ctx.config.public_scope));
        contents.replace(&literal, &public)
    }
}

impl Processor for ScriptProcessor {
    fn name(&self) -> &'static str { "script" }

    fn handles(&self, input: &Path) -> bool {
        has_extension(input, &["js"])
    }

    fn process(
        &self,
        entry: &AssetEntry,
        output: &Path,
        ctx: &ProcessContext<'_>,
    ) -> Result<Outcome, PipelineError> {
        let input = Path::new(&entry.source_path);
        let contents = fs::read_to_string(input).map_err(io_error(input))?;
        let contents = Self::link_wasm(entry, contents, ctx);
        let contents = substitute_asset_paths(&contents, ctx.manifest, &ctx.config.public_scope)?;

        let Some(minifier) = &self.minifier else {
            write_output(output, contents.as_bytes())?;
            return Ok(Outcome::Written);
        };

        let mut command = Command::new(minifier);
        command.arg("--compress").arg("-o").arg(output);
        if ctx.config.source_maps {
            let map_name = format!("{}.map", output.file_name().unwrap_or_default().to_string_lossy());
            command.arg("--source-map").arg(format!("url='{}'", map_name));
        }
        run_capture(&mut command, input, Some(contents.as_bytes()))?;
        ctx.logger.log("publish", format!("Minified `{}`", input.display()));
        Ok(Outcome::Written)
    }
}

/// Ordered processor registry; the first processor that handles a path
/// wins, plain copy otherwise.
pub struct ProcessorSet {
    processors: Vec<Box<dyn Processor>>,
    fallback: CopyProcessor,
}

impl ProcessorSet {
    pub fn new(processors: Vec<Box<dyn Processor>>) -> Self {
        Self { processors, fallback: CopyProcessor }
    }

    /// Stylesheet and script processors backed by whatever is on `PATH`.
    pub fn detect() -> Self {
        Self::new(vec![
            Box::new(StylesheetProcessor::detect()),
            Box::new(ScriptProcessor::detect()),
        ])
    }

    pub fn processor_for(&self, input: &Path) -> &dyn Processor {
        self.processors
            .iter()
            .find(|p| p.handles(input))
            .map(|p| p.as_ref())
            .unwrap_or(&self.fallback)
    }

    pub fn process(
        &self,
        entry: &AssetEntry,
        output: &Path,
        ctx: &ProcessContext<'_>,
    ) -> Result<Outcome, PipelineError> {
        let processor = self.processor_for(Path::new(&entry.source_path));
        ctx.logger.debug("publish", format!("{} <- {}", processor.name(), entry.source_path));
        processor.process(entry, output, ctx)
    }
}

impl Default for ProcessorSet {
    fn default() -> Self {
        Self::detect()
    }
}

// --- Compression ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Compressor {
    #[default]
    Gzip,
    Brotli,
}

impl Compressor {
    pub fn program(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Brotli => "brotli",
        }
    }
}

impl Compression {
    pub fn compressors(self) -> &'static [Compressor] {
        match self {
            Self::Gzip => &[Compressor::Gzip],
            Self::Brotli => &[Compressor::Brotli],
            Self::All => &[Compressor::Gzip, Compressor::Brotli],
            Self::None => &[],
        }
    }
}

/// Compress every file with every configured compressor, keeping the
/// originals. All processes run concurrently; any non-zero exit fails.
pub fn compress(files: &[PathBuf], compression: Compression) -> Result<usize, PipelineError> {
    let mut children: Vec<(PathBuf, Child)> = vec![];
    let mut failure = None;
    'spawn: for file in files {
        for compressor in compression.compressors() {
            match Command::new(compressor.program())
                .arg("-kf")
                .arg(file)
                .stdout(Stdio::null())
                .spawn()
            {
                Ok(child) => children.push((file.clone(), child)),
                Err(e) => {
                    failure = Some(PipelineError::Processor {
                        path: file.clone(),
                        message: format!("{}: {}", compressor.program(), e),
                    });
                    break 'spawn;
                }
            }
        }
    }
    wait_all(children, failure)
}

/// Reap every child, then report the first failure seen.
fn wait_all(children: Vec<(PathBuf, Child)>, mut failure: Option<PipelineError>) -> Result<usize, PipelineError> {
    let count = children.len();
    for (file, mut child) in children {
        let error = match child.wait() {
            Ok(status) if status.success() => continue,
            Ok(status) => PipelineError::Processor {
                message: format!("compression exited with {}", status),
                path: file,
            },
            Err(source) => PipelineError::Io { path: file, source },
        };
        failure.get_or_insert(error);
    }
    match failure {
        Some(error) => Err(error),
        None => Ok(count),
    }
}

/// Compressed bytes of `input`, read from the compressor's stdout.
pub fn compress_to_vec(compressor: Compressor, input: &Path) -> Result<Vec<u8>, PipelineError> {
    let mut command = Command::new(compressor.program());
    command.arg("-kc").arg(input);
    run_capture(&mut command, input, None)
}

/// Where `entry` is published under `public_dir`.
pub fn output_path(public_dir: &Path, entry: &AssetEntry) -> PathBuf {
    public_dir.join(filename_with_fingerprint(&entry.source_path, &entry.fingerprint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ctx<'a>(manifest: &'a Manifest, config: &'a BuildConfig, logger: &'a Logger) -> ProcessContext<'a> {
        ProcessContext { manifest, config, logger }
    }

    #[test]
    fn test_dispatch() {
        let set = ProcessorSet::new(vec![
            Box::new(StylesheetProcessor::without_compiler()),
            Box::new(ScriptProcessor::without_minifier()),
        ]);
        assert_eq!(set.processor_for(Path::new("a/site.scss")).name(), "stylesheet");
        assert_eq!(set.processor_for(Path::new("a/app.js")).name(), "script");
        assert_eq!(set.processor_for(Path::new("a/logo.png")).name(), "copy");
    }

    #[test]
    fn test_partial_stylesheet_is_skipped() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("_mixins.scss");
        fs::write(&src, "$x: 1;").unwrap();
        let mut m = Manifest::new();
        let entry = m.register(src.to_string_lossy(), "_mixins.scss", b"$x: 1;").clone();
        let (config, logger) = (BuildConfig::default(), Logger::quiet());

        let out = dir.path().join("out.css");
        let outcome = StylesheetProcessor::without_compiler()
            .process(&entry, &out, &ctx(&m, &config, &logger))
            .unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_sass_is_an_error() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("site.scss");
        fs::write(&src, "a{}").unwrap();
        let mut m = Manifest::new();
        let entry = m.register(src.to_string_lossy(), "site.scss", b"a{}").clone();
        let (config, logger) = (BuildConfig::default(), Logger::quiet());

        let err = StylesheetProcessor::without_compiler()
            .process(&entry, &dir.path().join("o.css"), &ctx(&m, &config, &logger))
            .unwrap_err();
        assert!(err.to_string().contains("Sass not found"));
    }

    #[test]
    fn test_script_links_wasm_sibling() {
        let dir = TempDir::new().unwrap();
        let js = dir.path().join("client.js");
        let wasm = dir.path().join("client.wasm");
        fs::write(&js, "load('client.wasm');").unwrap();
        fs::write(&wasm, "\0asm").unwrap();

        let mut m = Manifest::new();
        let entry = m.register(js.to_string_lossy(), "client.js", b"js").clone();
        m.register(wasm.to_string_lossy(), "client.wasm", b"\0asm");
        let fp = m.lookup_by_alias("client.wasm").unwrap().fingerprint.clone();
        let (config, logger) = (BuildConfig::default(), Logger::quiet());

        let out = dir.path().join("client-out.js");
        ScriptProcessor::without_minifier()
            .process(&entry, &out, &ctx(&m, &config, &logger))
            .unwrap();
        assert_eq!(fs::read_to_string(&out).unwrap(), format!("load('/assets/client-{fp}.wasm');"));
    }

    #[test]
    fn test_copy() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("logo.png");
        fs::write(&src, [0x89, b'P', b'N', b'G']).unwrap();
        let mut m = Manifest::new();
        let entry = m.register(src.to_string_lossy(), "logo.png", b"png").clone();
        let (config, logger) = (BuildConfig::default(), Logger::quiet());

        let out = output_path(dir.path(), &entry);
        CopyProcessor.process(&entry, &out, &ctx(&m, &config, &logger)).unwrap();
        assert_eq!(fs::read(&out).unwrap(), vec![0x89, b'P', b'N', b'G']);
    }

    #[test]
    fn test_partial_detection() {
        assert!(is_stylesheet_partial(Path::new("css/_mixins.scss")));
        assert!(!is_stylesheet_partial(Path::new("css/site.scss")));
        assert!(!is_stylesheet_partial(Path::new("js/_private.js")));
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_all_reaps_every_child() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("done");
        let failing = Command::new("sh").arg("-c").arg("exit 3").spawn().unwrap();
        let slow = Command::new("sh")
            .arg("-c")
            .arg(format!("sleep 0.2; touch '{}'", marker.display()))
            .spawn()
            .unwrap();

        let err = wait_all(
            vec![(PathBuf::from("a.css"), failing), (PathBuf::from("b.css"), slow)],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::Processor { ref path, .. } if path == Path::new("a.css")));
        assert!(marker.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_wait_all_keeps_spawn_failure_first() {
        let ok = Command::new("sh").arg("-c").arg("exit 0").spawn().unwrap();
        let spawn_failure = PipelineError::Processor {
            path: PathBuf::from("c.css"),
            message: "brotli: not found".to_string(),
        };
        let err = wait_all(vec![(PathBuf::from("b.css"), ok)], Some(spawn_failure)).unwrap_err();
        assert!(err.to_string().contains("brotli: not found"));
    }

    #[test]
    fn test_compressors() {
        assert_eq!(Compression::All.compressors().len(), 2);
        assert!(Compression::None.compressors().is_empty());
        assert_eq!(compress(&[], Compression::All).unwrap(), 0);
    }
}
