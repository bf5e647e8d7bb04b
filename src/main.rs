use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use jreach::{
    CallFilter, CallGraph, ClasspathExtractor, EdgeResolution, GraphBuilder,
    ImplSuffixConvention, IncludeAll, MethodKey, MethodNode, PrefixFilter,
};

/// CLI arguments for jreach execution.
#[derive(Parser, Debug)]
#[command(
    name = "jreach",
    about = "Reconstruct the transitive call graph of a JVM class from compiled classes.",
    version
)]
struct Cli {
    /// Fully qualified name of the class whose methods seed the graph.
    class_name: String,
    /// Class directory or jar holding the root class.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
    /// Additional class directories or jars, searched in order.
    #[arg(long, value_name = "PATH")]
    classpath: Vec<PathBuf>,
    /// Only follow classes under these package prefixes.
    #[arg(long, value_name = "PREFIX")]
    include: Vec<String>,
    /// Look interface calls up on the interface itself instead of the
    /// `.impl`/`Impl` convention.
    #[arg(long)]
    no_impl_resolution: bool,
    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
    #[arg(long)]
    quiet: bool,
    #[arg(long)]
    timing: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum Format {
    Json,
    Tree,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    if !cli.input.exists() {
        anyhow::bail!("input not found: {}", cli.input.display());
    }
    for entry in &cli.classpath {
        if !entry.exists() {
            anyhow::bail!("classpath entry not found: {}", entry.display());
        }
    }

    let started_at = Instant::now();
    let mut roots = vec![cli.input.clone()];
    roots.extend(cli.classpath.iter().cloned());
    let mut extractor = ClasspathExtractor::new(&roots)?;

    let graph = if cli.include.is_empty() {
        build_graph(
            &mut extractor,
            &IncludeAll,
            cli.no_impl_resolution,
            &cli.class_name,
        )?
    } else {
        let filter = PrefixFilter::new(cli.include.clone());
        build_graph(
            &mut extractor,
            &filter,
            cli.no_impl_resolution,
            &cli.class_name,
        )?
    };

    if !cli.quiet {
        for diagnostic in &graph.diagnostics {
            eprintln!("warning: {}: {}", diagnostic.class_name, diagnostic.reason);
        }
    }

    let mut writer = output_writer(cli.output.as_deref())?;
    match cli.format {
        Format::Json => {
            serde_json::to_writer_pretty(&mut writer, &graph)
                .context("failed to serialize call graph")?;
            writer
                .write_all(b"\n")
                .context("failed to write call graph")?;
        }
        Format::Tree => {
            write_tree(&mut writer, &graph).context("failed to write call graph")?;
        }
    }

    if cli.timing && !cli.quiet {
        eprintln!(
            "timing: total_ms={} nodes={} diagnostics={}",
            started_at.elapsed().as_millis(),
            graph.nodes.len(),
            graph.diagnostics.len()
        );
    }

    Ok(())
}

fn build_graph(
    extractor: &mut ClasspathExtractor,
    filter: &dyn CallFilter,
    no_impl_resolution: bool,
    class_name: &str,
) -> Result<CallGraph> {
    let resolver = ImplSuffixConvention;
    let mut builder = GraphBuilder::new(extractor, filter);
    if !no_impl_resolution {
        builder = builder.with_resolver(&resolver);
    }
    builder.build(class_name)
}

fn output_writer(output: Option<&Path>) -> Result<Box<dyn Write>> {
    match output {
        Some(path) if path == Path::new("-") => Ok(Box::new(io::stdout())),
        Some(path) => Ok(Box::new(
            File::create(path).with_context(|| format!("failed to open {}", path.display()))?,
        )),
        None => Ok(Box::new(io::stdout())),
    }
}

/// Indented text rendering of the graph, one root method per block.
/// Shared nodes are printed again at every occurrence; the path set keeps
/// the rendering finite when an expanded edge loops back through one.
fn write_tree(writer: &mut dyn Write, graph: &CallGraph) -> io::Result<()> {
    writeln!(writer, "{}", graph.root_class)?;
    for root in graph.root_nodes() {
        let mut path = HashSet::new();
        write_node(writer, graph, root, 1, &mut path)?;
    }
    Ok(())
}

fn write_node(
    writer: &mut dyn Write,
    graph: &CallGraph,
    node: &MethodNode,
    depth: usize,
    path: &mut HashSet<MethodKey>,
) -> io::Result<()> {
    let indent = "  ".repeat(depth);
    writeln!(writer, "{indent}{} [{}]", node.key, node.kind)?;
    if !path.insert(node.key.clone()) {
        return Ok(());
    }
    for edge in &node.calls {
        let child_indent = "  ".repeat(depth + 1);
        match &edge.resolution {
            EdgeResolution::Expanded(key) => {
                if path.contains(key) {
                    writeln!(writer, "{child_indent}{key} [cycle]")?;
                } else if let Some(child) = graph.node(key) {
                    write_node(writer, graph, child, depth + 1, path)?;
                }
            }
            EdgeResolution::Truncated(key) => {
                writeln!(writer, "{child_indent}{key} [cycle]")?;
            }
            EdgeResolution::Leaf(key) => {
                writeln!(writer, "{child_indent}{key} [{}]", edge.site.kind)?;
            }
            EdgeResolution::Unresolved => {
                writeln!(
                    writer,
                    "{child_indent}{}.{}({}) [{}] (unresolved)",
                    edge.site.class_name,
                    edge.site.method_name,
                    edge.site.params.join(","),
                    edge.site.kind
                )?;
            }
        }
    }
    path.remove(&node.key);
    Ok(())
}
