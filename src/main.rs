//! Command-line interface for xmldom

#[cfg(feature = "cli")]
use clap::{ArgAction, Parser, Subcommand};

#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
use xmldom::namespaces::NamespaceContext;
#[cfg(feature = "cli")]
use xmldom::{dom, Document, NamespaceResolver, NodeType, OutputOptions, Schema, XPathValue};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xmldom")]
#[command(author, version, about = "Format, query and validate XML documents", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a document and write it back to stdout
    Format {
        /// Path to the XML file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Indent element-only content by 4 spaces
        #[arg(short, long)]
        indent: bool,

        /// Leave out the XML declaration
        #[arg(long)]
        omit_declaration: bool,

        /// Parse without namespace processing
        #[arg(long)]
        no_namespaces: bool,
    },

    /// Evaluate an XPath expression against a document
    Query {
        /// Path to the XML file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// XPath 1.0 expression
        #[arg(value_name = "XPATH")]
        xpath: String,

        /// Bind a prefix for the expression, as prefix=uri
        #[arg(long = "ns", value_name = "PREFIX=URI", value_parser = parse_binding)]
        namespaces: Vec<(String, String)>,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Validate a document against an XSD schema
    Validate {
        /// Path to the XSD schema file
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Path to the XML file to validate
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[cfg(feature = "cli")]
fn parse_binding(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((prefix, uri)) if !prefix.is_empty() => Ok((prefix.to_string(), uri.to_string())),
        _ => Err(format!("expected prefix=uri, got '{}'", value)),
    }
}

#[cfg(feature = "cli")]
fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Format {
            file,
            indent,
            omit_declaration,
            no_namespaces,
        } => cmd_format(file, indent, omit_declaration, no_namespaces),
        Commands::Query {
            file,
            xpath,
            namespaces,
            json,
        } => cmd_query(file, xpath, namespaces, json),
        Commands::Validate { schema, file } => cmd_validate(schema, file),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn cmd_format(
    file: PathBuf,
    indent: bool,
    omit_declaration: bool,
    no_namespaces: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = dom::parse_file_with(&file, !no_namespaces)?;
    let options = OutputOptions::new()
        .indent(indent)
        .omit_declaration(omit_declaration);
    println!("{}", dom::as_xml_with(&doc, doc.root(), &options)?);
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_query(
    file: PathBuf,
    xpath: String,
    namespaces: Vec<(String, String)>,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = dom::parse_file(&file)?;
    let context: NamespaceContext = namespaces.into_iter().collect();
    let resolvers: Vec<&dyn NamespaceResolver> = if context.is_empty() {
        Vec::new()
    } else {
        vec![&context as &dyn NamespaceResolver]
    };

    let value = dom::evaluate_xpath(&doc, doc.root(), &xpath, &resolvers)?;
    let json = match &value {
        XPathValue::NodeSet(nodes) => {
            let items = nodes
                .iter()
                .map(|&node| render_node(&doc, node))
                .collect::<Result<Vec<_>, _>>()?;
            if !json_output {
                for item in &items {
                    println!("{}", item);
                }
                return Ok(());
            }
            serde_json::json!(items)
        }
        XPathValue::Boolean(b) => serde_json::json!(b),
        XPathValue::Number(n) => serde_json::json!(n),
        XPathValue::String(s) => serde_json::json!(s),
    };

    if json_output {
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{}", value.to_string_value(&doc));
    }
    Ok(())
}

/// Elements print as markup, every other node as its string value
#[cfg(feature = "cli")]
fn render_node(doc: &Document, node: xmldom::NodeId) -> xmldom::Result<String> {
    match doc.node_type(node) {
        Some(NodeType::Element) => {
            dom::as_xml_with(doc, node, &OutputOptions::new().omit_declaration(true))
        }
        _ => Ok(doc.text_content(node)),
    }
}

#[cfg(feature = "cli")]
fn cmd_validate(schema_path: PathBuf, file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let schema = Schema::from_file(&schema_path)?;
    let doc = dom::parse_file(&file)?;

    match schema.validate(&doc) {
        Ok(()) => {
            println!("✓ Document is valid");
            Ok(())
        }
        Err(error) => {
            println!("✗ Document is invalid");
            println!();
            println!("  - {}", error);
            std::process::exit(1);
        }
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}
