use clap::{Parser, Subcommand};

use seg_cli::commands::{config_ops, dict_ops, sync_ops};

#[derive(Parser)]
#[command(name = "segtool", about = "Segmentation dictionary tool")]
struct Cli {
    /// Write JSON trace logs to this directory (requires --features trace)
    #[arg(long, global = true)]
    log_dir: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every dictionary word found in a text
    Scan {
        /// Main word list (one word per line)
        dict_file: String,
        /// Text to scan
        text: String,
        /// Quantifier word list
        #[arg(long)]
        quantifiers: Option<String>,
        /// Stop-word list
        #[arg(long)]
        stop_words: Option<String>,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the match state after each character of a word
    Lookup {
        /// Word list
        dict_file: String,
        /// Word to look up
        word: String,
    },
    /// Show word and node counts of a word list
    Info {
        /// Word list
        dict_file: String,
    },
    /// Load a domain from the remote store and report its state
    Poll {
        /// Tenant domain
        domain: String,
        /// Settings TOML file (default: built-in settings)
        #[arg(long)]
        settings: Option<String>,
        /// Serve dictionaries from this directory
        #[arg(long)]
        root: Option<String>,
        /// Node id used for acknowledgements
        #[arg(long)]
        node: Option<String>,
        /// Keep polling on the configured schedule
        #[arg(long)]
        watch: bool,
    },
    /// Show which nodes acknowledged which version of a dictionary
    Acks {
        /// Store directory
        root: String,
        /// Dictionary endpoint, e.g. file://shop/main.dic
        endpoint: String,
        /// Output as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Export default settings as TOML
    SettingsExport,
    /// Validate a custom settings TOML file
    SettingsValidate {
        /// Path to the TOML file
        file: String,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Some(dir) = &cli.log_dir {
        seg_engine::init_tracing(std::path::Path::new(dir));
    }

    match cli.command {
        Command::Scan {
            dict_file,
            text,
            quantifiers,
            stop_words,
            json,
        } => dict_ops::scan(
            &dict_file,
            quantifiers.as_deref(),
            stop_words.as_deref(),
            &text,
            json,
        ),
        Command::Lookup { dict_file, word } => dict_ops::lookup(&dict_file, &word),
        Command::Info { dict_file } => dict_ops::info(&dict_file),
        Command::Poll {
            domain,
            settings,
            root,
            node,
            watch,
        } => sync_ops::poll(
            &domain,
            &sync_ops::PollOptions {
                settings: settings.as_deref(),
                root: root.as_deref(),
                node: node.as_deref(),
                watch,
            },
        ),
        Command::Acks {
            root,
            endpoint,
            json,
        } => sync_ops::acks(&root, &endpoint, json),
        Command::SettingsExport => config_ops::settings_export(),
        Command::SettingsValidate { file } => config_ops::settings_validate(&file),
    }
}
