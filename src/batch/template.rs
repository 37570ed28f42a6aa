// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 genomegenie contributors

//! Job script compiler
//!
//! Renders the three parts of a job script (module setup, step command and
//! scheduler header) from Jinja templates. Templates are looked up by name
//! in the configured directories, then among the built-ins (`module` and
//! `sge`).

use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::errors::{GenieError, GenieResult};
use crate::pipeline::OptionMap;

const BUILTIN_TEMPLATES: [(&str, &str); 2] = [
    ("module", include_str!("../../templates/module")),
    ("sge", include_str!("../../templates/sge")),
];

/// Renders named templates from an option map
pub trait ScriptCompiler: Send + Sync {
    /// Render `template` with `options` as its context
    fn render(&self, template: &str, options: &OptionMap) -> GenieResult<String>;

    /// Variables a template reads without declaring them
    fn template_vars(&self, template: &str) -> GenieResult<BTreeSet<String>>;
}

/// How undefined template variables are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Undefined variables are render errors
    #[default]
    Strict,
    /// Undefined variables render as empty text
    Lenient,
    /// Undefined variables render as their own `{{ name }}` placeholder
    Debug,
}

impl std::str::FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            "debug" => Ok(Self::Debug),
            _ => Err(format!("Unknown render mode: {}", s)),
        }
    }
}

/// Jinja-backed script compiler
pub struct TemplateCompiler {
    env: Environment<'static>,
    mode: RenderMode,
}

impl TemplateCompiler {
    /// Create a compiler searching `template_dirs` in order
    pub fn new(template_dirs: Vec<PathBuf>, mode: RenderMode) -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_undefined_behavior(match mode {
            RenderMode::Strict => UndefinedBehavior::Strict,
            RenderMode::Lenient | RenderMode::Debug => UndefinedBehavior::Lenient,
        });
        env.set_loader(move |name| load_template(&template_dirs, name));

        env.add_filter("vcf2tsv", |f: String| filename_filter(&f, "vcf", "tsv"));
        env.add_filter("vcf2bam", |f: String| filename_filter(&f, "vcf", "bam"));
        env.add_filter("ungz", |f: String| filename_filter(&f, ".gz", ""));
        env.add_filter("gz", |f: String| filename_filter(&f, "", ".gz"));
        env.add_filter("sample_name", |f: String| sample_name(&f));

        Self { env, mode }
    }
}

impl ScriptCompiler for TemplateCompiler {
    fn render(&self, template: &str, options: &OptionMap) -> GenieResult<String> {
        let tmpl = self
            .env
            .get_template(template)
            .map_err(|e| render_error(template, e))?;

        let rendered = if self.mode == RenderMode::Debug {
            let mut context = options.clone();
            for var in tmpl.undeclared_variables(false) {
                if !context.contains_key(&var) {
                    let placeholder = format!("{{{{ {var} }}}}");
                    context.insert(var, Value::String(placeholder));
                }
            }
            tmpl.render(&context)
        } else {
            tmpl.render(options)
        };

        rendered.map_err(|e| {
            tracing::error!("'{}': {:#}", template, e);
            render_error(template, e)
        })
    }

    fn template_vars(&self, template: &str) -> GenieResult<BTreeSet<String>> {
        let tmpl = self
            .env
            .get_template(template)
            .map_err(|e| render_error(template, e))?;
        Ok(tmpl.undeclared_variables(false).into_iter().collect())
    }
}

fn render_error(template: &str, e: minijinja::Error) -> GenieError {
    GenieError::TemplateRenderError {
        template: template.to_string(),
        message: e.to_string(),
    }
}

fn load_template(dirs: &[PathBuf], name: &str) -> Result<Option<String>, minijinja::Error> {
    if name.contains("..") || Path::new(name).is_absolute() {
        return Ok(None);
    }

    for dir in dirs {
        for candidate in [dir.join(name), dir.join(format!("{name}.j2"))] {
            if candidate.is_file() {
                return std::fs::read_to_string(&candidate).map(Some).map_err(|e| {
                    minijinja::Error::new(
                        ErrorKind::InvalidOperation,
                        format!("could not read {}: {e}", candidate.display()),
                    )
                });
            }
        }
    }

    Ok(BUILTIN_TEMPLATES
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|(_, source)| source.to_string()))
}

/// Replace everything from the last `ext1` in `fname` with `ext2`.
///
/// Names without `ext1` are returned unchanged.
pub fn filename_filter(fname: &str, ext1: &str, ext2: &str) -> String {
    match fname.rfind(ext1) {
        Some(idx) => format!("{}{}", &fname[..idx], ext2),
        None => fname.to_string(),
    }
}

/// Sample name of an input file: its base name without extensions
pub fn sample_name(filename: &str) -> String {
    let base = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    base.split('.').next().unwrap_or(base).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn opts(v: Value) -> OptionMap {
        v.as_object().cloned().unwrap()
    }

    fn template_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("gatk"),
            "gatk Mutect2 -R {{ ref_fasta }} -I {{ normal_bam }} -O {{ normal_bam | vcf2tsv }}",
        )
        .unwrap();
        std::fs::write(dir.path().join("pon.j2"), "pon {{ normal_bam | join(' ') }}").unwrap();
        dir
    }

    #[test]
    fn test_filename_filters() {
        assert_eq!(filename_filter("calls.vcf.gz", "vcf", "tsv"), "calls.tsv");
        assert_eq!(filename_filter("calls.vcf.gz", ".gz", ""), "calls.vcf");
        assert_eq!(filename_filter("calls.vcf", "", ".gz"), "calls.vcf.gz");
        assert_eq!(filename_filter("calls.bam", "vcf", "tsv"), "calls.bam");
        assert_eq!(sample_name("/in/RADS18B_merge.bam"), "RADS18B_merge");
    }

    #[test]
    fn test_render_builtin_header() {
        let compiler = TemplateCompiler::new(Vec::new(), RenderMode::Strict);
        let header = compiler
            .render(
                "sge",
                &opts(json!({
                    "name": "test-job",
                    "queue": "short.q",
                    "log_directory": "batch",
                    "walltime": "00:30:00",
                    "cputime": "00:30:00",
                    "memory": "16G",
                    "nprocs": 2
                })),
            )
            .unwrap();

        assert!(header.contains("#$ -N test-job"));
        assert!(header.contains("#$ -l h_vmem=16G"));
        assert!(header.contains("#$ -pe threaded 2"));
    }

    #[test]
    fn test_render_module_setup() {
        let compiler = TemplateCompiler::new(Vec::new(), RenderMode::Strict);
        let setup = compiler
            .render("module", &opts(json!({"modules": ["gatk-4.0.1", "samtools"]})))
            .unwrap();
        assert!(setup.contains("module load gatk-4.0.1"));
        assert!(setup.contains("module load samtools"));
    }

    #[test]
    fn test_render_from_template_dir() {
        let dir = template_dir();
        let compiler = TemplateCompiler::new(vec![dir.path().to_path_buf()], RenderMode::Strict);

        let cmd = compiler
            .render(
                "gatk",
                &opts(json!({"ref_fasta": "ref.fa", "normal_bam": "n1.vcf"})),
            )
            .unwrap();
        assert_eq!(cmd, "gatk Mutect2 -R ref.fa -I n1.vcf -O n1.tsv");

        let pon = compiler
            .render("pon", &opts(json!({"normal_bam": ["a.bam", "b.bam"]})))
            .unwrap();
        assert_eq!(pon, "pon a.bam b.bam");
    }

    #[test]
    fn test_strict_undefined_is_render_error() {
        let dir = template_dir();
        let compiler = TemplateCompiler::new(vec![dir.path().to_path_buf()], RenderMode::Strict);
        let result = compiler.render("gatk", &opts(json!({"ref_fasta": "ref.fa"})));
        assert!(matches!(result, Err(GenieError::TemplateRenderError { .. })));
    }

    #[test]
    fn test_lenient_and_debug_modes() {
        let dir = template_dir();
        let options = opts(json!({"ref_fasta": "ref.fa", "normal_bam": "n1.vcf"}));
        let mut partial = options.clone();
        partial.remove("ref_fasta");

        let lenient = TemplateCompiler::new(vec![dir.path().to_path_buf()], RenderMode::Lenient);
        let cmd = lenient.render("gatk", &partial).unwrap();
        assert!(cmd.starts_with("gatk Mutect2 -R  -I n1.vcf"));

        let debug = TemplateCompiler::new(vec![dir.path().to_path_buf()], RenderMode::Debug);
        let cmd = debug.render("gatk", &partial).unwrap();
        assert!(cmd.contains("-R {{ ref_fasta }}"));
    }

    #[test]
    fn test_missing_template() {
        let compiler = TemplateCompiler::new(vec![PathBuf::from("nonexistent")], RenderMode::Strict);
        assert!(matches!(
            compiler.render("nonexistent", &OptionMap::new()),
            Err(GenieError::TemplateRenderError { .. })
        ));
        assert!(compiler.render("../etc/passwd", &OptionMap::new()).is_err());
    }

    #[test]
    fn test_template_vars() {
        let dir = template_dir();
        let compiler = TemplateCompiler::new(vec![dir.path().to_path_buf()], RenderMode::Strict);
        let vars = compiler.template_vars("gatk").unwrap();
        assert_eq!(
            vars.into_iter().collect::<Vec<_>>(),
            vec!["normal_bam".to_string(), "ref_fasta".to_string()]
        );
    }
}
