//! Stock CLI
//!
//! Lists and edits the inventory held by a stock server.

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, Table};
use stock_client::{ClientError, HttpTransport, ItemForm, StockClient};
use stock_core::StockItem;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stock")]
#[command(about = "Inventory by brand, model, size and color")]
struct Cli {
    /// Endpoint of the stock server
    #[arg(long, env = "STOCK_URL", default_value = "http://127.0.0.1:8080/exec")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show every item, sorted by brand
    List,
    /// Add a new item
    Add(AddArgs),
    /// Set the quantity of an existing item
    Update {
        /// Item identifier as shown by `list`
        id: String,
        quantidade: String,
    },
    /// Remove an item
    Delete {
        /// Item identifier as shown by `list`
        id: String,
    },
}

#[derive(Args)]
struct AddArgs {
    #[arg(long)]
    marca: String,
    #[arg(long, default_value = "")]
    modelo: String,
    #[arg(long, default_value = "")]
    tamanho: String,
    #[arg(long, default_value = "")]
    cor: String,
    #[arg(long, default_value = "0")]
    quantidade: String,
}

impl From<AddArgs> for ItemForm {
    fn from(args: AddArgs) -> Self {
        ItemForm {
            marca: args.marca,
            modelo: args.modelo,
            tamanho: args.tamanho,
            cor: args.cor,
            quantidade: args.quantidade,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(items) => {
            println!("{}", render(&items));
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("Error: {err}");
            if err.is_contention() {
                eprintln!("The store is busy, try again in a moment.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Vec<StockItem>, ClientError> {
    let mut client = StockClient::new(HttpTransport::new(&cli.url)?);

    let items = match cli.command {
        Commands::List => client.refresh().await?,
        Commands::Add(args) => client.add(&ItemForm::from(args)).await?,
        Commands::Update { id, quantidade } => {
            let selected = select(&mut client, &id).await?;
            let mut form = ItemForm::from_item(&selected);
            form.quantidade = quantidade;
            client.update(&selected, &form).await?
        }
        Commands::Delete { id } => {
            let selected = select(&mut client, &id).await?;
            client.delete(&selected).await?
        }
    };
    Ok(items.to_vec())
}

/// Load the collection and pick the item the user named.
async fn select(
    client: &mut StockClient<HttpTransport>,
    id: &str,
) -> Result<StockItem, ClientError> {
    let items = client.refresh().await?;
    items
        .iter()
        .find(|item| item.id == id.trim())
        .cloned()
        .ok_or_else(|| ClientError::Backend {
            code: Some(stock_core::ErrorCode::Lookup),
            message: format!("no item with id '{}'", id.trim()),
        })
}

fn render(items: &[StockItem]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["ID", "MARCA", "MODELO", "TAMANHO", "COR", "QUANTIDADE"]);
    for item in items {
        table.add_row(vec![
            Cell::new(&item.id),
            Cell::new(&item.marca),
            Cell::new(&item.modelo),
            Cell::new(&item.tamanho),
            Cell::new(&item.cor),
            Cell::new(item.quantidade).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}
