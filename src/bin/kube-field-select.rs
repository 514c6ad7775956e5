//! Kubernetes Field Selection CLI
//!
//! Command-line interface for exploring resource schemas and building
//! minimal field-selection schemas.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use kube_field_select::logging::{setup_logging, LogFormat};
use kube_field_select::{
    all_expandable_paths, build_children, build_tree, initial_expansion, load_schema_auto,
    normalize_path, DocumentLoader, FileStore, ResourceRef, SchemaExplorer, SchemaNode,
    SchemaTreeNode, SelectOutcome, SelectionSession, SelectionStateStore, SourceKind,
    TemplateField, TreeOptions,
};
use tracing::warn;

/// Source id under which a schema given on the command line is cached.
const CLI_SOURCE_ID: &str = "cli";

#[derive(Parser)]
#[command(name = "kube-field-select")]
#[command(about = "Explore Kubernetes and CRD schemas and build minimal field-selection schemas")]
#[command(version)]
struct Cli {
    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    log_level: Option<tracing::Level>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the field tree of a resource
    Tree {
        /// Schema source: swagger/OpenAPI document or CRD, file path or URL
        schema: String,

        /// Resource: apiVersion/kind (e.g. apps/v1/Deployment), or group/version/kind with --crd
        #[arg(long, short)]
        resource: String,

        /// Treat the resource as a custom resource
        #[arg(long)]
        crd: bool,

        /// Expand this path (repeatable; default: first level)
        #[arg(long = "expand", conflicts_with = "all")]
        expand: Vec<String>,

        /// Expand every node
        #[arg(long)]
        all: bool,

        /// Output the tree as JSON
        #[arg(long)]
        json: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the minimal schema containing the selected fields
    Filter {
        /// Schema source: swagger/OpenAPI document or CRD, file path or URL
        schema: String,

        /// Resource: apiVersion/kind, or group/version/kind with --crd
        #[arg(long, short)]
        resource: String,

        /// Treat the resource as a custom resource
        #[arg(long)]
        crd: bool,

        /// Selected field path (repeatable)
        #[arg(long = "field", short, required = true)]
        fields: Vec<String>,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Print the canonical form of a field path
    Normalize {
        /// Field path as captured (e.g. properties.spec.properties.replicas)
        path: String,

        /// Resource: apiVersion/kind, or group/version/kind with --crd
        #[arg(long, short)]
        resource: String,

        /// Treat the resource as a custom resource
        #[arg(long)]
        crd: bool,
    },

    /// Add or remove persisted field selections for a resource
    Select {
        /// Schema source: swagger/OpenAPI document or CRD, file path or URL
        schema: String,

        /// Resource: apiVersion/kind, or group/version/kind with --crd
        #[arg(long, short)]
        resource: String,

        /// Treat the resource as a custom resource
        #[arg(long)]
        crd: bool,

        /// Directory holding persisted selection state
        #[arg(long)]
        state_dir: PathBuf,

        /// Select a field path (repeatable)
        #[arg(long)]
        add: Vec<String>,

        /// Deselect a field path (repeatable)
        #[arg(long)]
        remove: Vec<String>,

        /// Clear the selection before applying --add
        #[arg(long)]
        clear: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(cli.log_level, cli.log_format) {
        eprintln!("Error: {}", e);
        return ExitCode::from(2);
    }

    let result = match cli.command {
        Commands::Tree {
            schema,
            resource,
            crd,
            expand,
            all,
            json,
            output,
            pretty,
        } => run_tree(TreeArgs {
            schema,
            resource,
            crd,
            expand,
            all,
            json,
            output,
            pretty,
        }),

        Commands::Filter {
            schema,
            resource,
            crd,
            fields,
            output,
            pretty,
        } => run_filter(&schema, &resource, crd, &fields, output, pretty),

        Commands::Normalize {
            path,
            resource,
            crd,
        } => run_normalize(&path, &resource, crd),

        Commands::Select {
            schema,
            resource,
            crd,
            state_dir,
            add,
            remove,
            clear,
            output,
            pretty,
        } => run_select(SelectArgs {
            schema,
            resource,
            crd,
            state_dir,
            add,
            remove,
            clear,
            output,
            pretty,
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

struct TreeArgs {
    schema: String,
    resource: String,
    crd: bool,
    expand: Vec<String>,
    all: bool,
    json: bool,
    output: Option<PathBuf>,
    pretty: bool,
}

fn run_tree(args: TreeArgs) -> Result<(), u8> {
    let resource = parse_resource(&args.resource, args.crd)?;
    let mut explorer = open_explorer(&args.schema)?;
    let root = resolve_root(&mut explorer, &resource)?;

    let expanded = if args.all {
        all_expandable_paths(&root)
    } else if args.expand.is_empty() {
        initial_expansion(&root, None, &TreeOptions::default())
    } else {
        let context = resource.context();
        args.expand
            .iter()
            .map(|p| normalize_path(p, &context))
            .collect::<BTreeSet<_>>()
    };
    let tree = build_tree(&root, &expanded);

    let rendered = if args.json {
        to_json(&tree, args.pretty)?
    } else {
        let mut out = String::new();
        render_text(&tree, 0, &mut out);
        out.trim_end().to_string()
    };
    write_output(&rendered, args.output)
}

fn run_filter(
    schema_source: &str,
    resource: &str,
    crd: bool,
    paths: &[String],
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let resource = parse_resource(resource, crd)?;
    let mut explorer = open_explorer(schema_source)?;
    let root = resolve_root(&mut explorer, &resource)?;

    let context = resource.context();
    let fields: Vec<TemplateField> = paths
        .iter()
        .map(|raw| {
            let path = normalize_path(raw, &context);
            template_field(&root, &path).unwrap_or_else(|| {
                warn!(path, "field not found in schema");
                TemplateField::new(path, "any")
            })
        })
        .collect();

    let filtered = explorer
        .get_filtered_schema(&resource.key(), &fields)
        .map_err(|e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        })?;
    write_output(&to_json(&filtered.to_value(), pretty)?, output)
}

fn run_normalize(path: &str, resource: &str, crd: bool) -> Result<(), u8> {
    let resource = parse_resource(resource, crd)?;
    println!("{}", normalize_path(path, &resource.context()));
    Ok(())
}

struct SelectArgs {
    schema: String,
    resource: String,
    crd: bool,
    state_dir: PathBuf,
    add: Vec<String>,
    remove: Vec<String>,
    clear: bool,
    output: Option<PathBuf>,
    pretty: bool,
}

fn run_select(args: SelectArgs) -> Result<(), u8> {
    let resource = parse_resource(&args.resource, args.crd)?;
    let mut explorer = open_explorer(&args.schema)?;
    let root = resolve_root(&mut explorer, &resource)?;

    let store = SelectionStateStore::new(
        FileStore::new(&args.state_dir),
        FileStore::new(&args.state_dir),
    );
    let mut session = SelectionSession::new(store, TreeOptions::default());
    session.switch_resource(&resource.key());

    let session_error = |e: kube_field_select::SessionError| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    };

    if args.clear {
        session.clear_selection().map_err(session_error)?;
    }

    let context = resource.context();
    for raw in &args.remove {
        let path = normalize_path(raw, &context);
        if !session.deselect_field(&path).map_err(session_error)? {
            eprintln!("Note: {} was not selected", path);
        }
    }

    for raw in &args.add {
        let path = normalize_path(raw, &context);
        let Some(field) = template_field(&root, &path) else {
            eprintln!("Error: field {} does not exist in {}", path, resource);
            return Err(2);
        };
        match session.select_field(field).map_err(session_error)? {
            SelectOutcome::Selected { replaced } => {
                for old in replaced {
                    eprintln!("Note: {} replaces selected descendant {}", path, old);
                }
            }
            SelectOutcome::Absorbed { ancestor } => {
                eprintln!("Note: {} is already covered by {}", path, ancestor);
            }
            SelectOutcome::AlreadySelected => {}
        }
    }

    write_output(&to_json(session.selected_fields(), args.pretty)?, args.output)
}

// --- Helpers ---

fn parse_resource(resource: &str, crd: bool) -> Result<ResourceRef, u8> {
    let parsed = if crd {
        let rest = resource.strip_prefix("crd:").unwrap_or(resource);
        let mut parts = rest.splitn(3, '/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(g), Some(v), Some(k)) if !g.is_empty() && !v.is_empty() && !k.is_empty() => {
                Some(ResourceRef::crd(g, v, k))
            }
            _ => None,
        }
    } else {
        ResourceRef::parse(resource)
    };
    parsed.ok_or_else(|| {
        eprintln!(
            "Error: invalid resource \"{}\": expected apiVersion/kind, or group/version/kind with --crd",
            resource
        );
        2u8
    })
}

fn open_explorer(schema_source: &str) -> Result<SchemaExplorer<DocumentLoader>, u8> {
    let document = load_schema_auto(schema_source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    Ok(SchemaExplorer::new(DocumentLoader::new(document)))
}

fn resolve_root(
    explorer: &mut SchemaExplorer<DocumentLoader>,
    resource: &ResourceRef,
) -> Result<Arc<SchemaNode>, u8> {
    let gvk = &resource.gvk;
    let result = match resource.source {
        SourceKind::Kubernetes => explorer.resolve_resource(CLI_SOURCE_ID, &resource.key()),
        SourceKind::Crd => explorer.resolve_crd(&gvk.group, &gvk.version, &gvk.kind),
    };
    result.map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

/// Tree entry for `path`, carrying its type and required flag.
fn template_field(root: &SchemaNode, path: &str) -> Option<TemplateField> {
    let parent_path = path.rsplit_once('.').map(|(p, _)| p).unwrap_or("");
    let parent = if parent_path.is_empty() {
        root
    } else {
        root.find(parent_path)?
    };
    build_children(parent, parent_path, 0)
        .iter()
        .find(|n| n.path == path)
        .map(TemplateField::from)
}

fn render_text(nodes: &[SchemaTreeNode], depth: usize, out: &mut String) {
    for node in nodes {
        let mut line = format!("{}{}: {}", "  ".repeat(depth), node.name, node.type_name);
        if node.required {
            line.push_str(" (required)");
        }
        if node.is_reference {
            line.push_str(" [ref]");
        }
        if node.has_children && node.children.is_empty() {
            line.push_str(" ...");
        }
        out.push_str(&line);
        out.push('\n');
        render_text(&node.children, depth + 1, out);
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String, u8> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })
}

fn write_output(content: &str, output: Option<PathBuf>) -> Result<(), u8> {
    match output {
        Some(path) => {
            std::fs::write(&path, content).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
