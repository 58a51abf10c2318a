//! Courier CLI

use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use courier::{
    orders::timestamps::{format_date_time, parse_date_time, parse_time},
    prelude::*,
};
use jiff::{Zoned, civil::DateTime};
use tabled::{builder::Builder, settings::Style};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "courier", about = "Food delivery order lifecycle and refund ledger", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "COURIER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding the catalog and order files, overriding the configuration
    #[arg(long, global = true, env = "COURIER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List restaurants with their menus and offers
    Restaurants,

    /// List orders, optionally only those of one customer
    Orders {
        /// Customer email
        #[arg(long)]
        customer: Option<String>,
    },

    /// Show the front of a restaurant's queue
    Queue {
        /// Restaurant id
        restaurant: String,

        /// How many orders to show
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Place a new order
    Create(CreateArgs),

    /// Confirm a pending order
    Confirm {
        /// Order id
        order: OrderId,
    },

    /// Reject a pending order
    Reject {
        /// Order id
        order: OrderId,
    },

    /// Deliver an order that is being prepared
    Deliver {
        /// Order id
        order: OrderId,
    },

    /// Apply an action to the front of a restaurant's queue
    Process {
        /// Restaurant id
        restaurant: String,

        /// Action to apply
        action: StaffAction,

        /// How many orders from the front
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Cancel one of a customer's pending orders
    Cancel {
        /// Customer email
        #[arg(long)]
        customer: String,

        /// Order id
        order: OrderId,
    },

    /// Change one of a customer's pending orders
    Modify(ModifyArgs),

    /// Expire or retain every pending order due today
    Bulk {
        /// Override the current time, as dd/mm/yyyy hh:mm
        #[arg(long, value_parser = parse_date_time)]
        now: Option<DateTime>,
    },

    /// Show delivered and refunded totals
    Report,
}

#[derive(Debug, Args)]
struct CreateArgs {
    /// Customer email
    #[arg(long)]
    customer: String,

    /// Restaurant id
    #[arg(long)]
    restaurant: String,

    /// Delivery date and time, as dd/mm/yyyy hh:mm
    #[arg(long, value_parser = parse_date_time)]
    delivery: DateTime,

    /// Delivery address
    #[arg(long)]
    address: String,

    /// Item as `Name,Qty`; repeat for more items
    #[arg(long = "item", required = true, value_parser = parse_item)]
    items: Vec<ItemEntry>,

    /// Special offer code
    #[arg(long)]
    offer: Option<String>,

    /// Note for the restaurant
    #[arg(long)]
    request: Option<String>,

    /// Payment method: CC, PP or CD
    #[arg(long)]
    payment: Option<PaymentMethod>,
}

#[derive(Debug, Args)]
#[command(group(ArgGroup::new("change").required(true).multiple(true).args(["items", "address", "time"])))]
struct ModifyArgs {
    /// Customer email
    #[arg(long)]
    customer: String,

    /// Order id
    order: OrderId,

    /// Replacement item list as `Name,Qty`; repeat for more items
    #[arg(long = "item", value_parser = parse_item)]
    items: Vec<ItemEntry>,

    /// New delivery address
    #[arg(long)]
    address: Option<String>,

    /// New delivery time on the same day, as hh:mm
    #[arg(long)]
    time: Option<String>,

    /// Pay the difference when the new items cost more
    #[arg(long)]
    accept_difference: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StaffAction {
    Confirm,
    Reject,
    Deliver,
}

impl From<StaffAction> for Action {
    fn from(action: StaffAction) -> Self {
        match action {
            StaffAction::Confirm => Action::Confirm,
            StaffAction::Reject => Action::Reject,
            StaffAction::Deliver => Action::Deliver,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),

    #[error(
        "new total {updated} is higher than {previous}; pass --accept-difference to pay the extra {difference}"
    )]
    DifferenceNotAccepted {
        previous: String,
        updated: String,
        difference: String,
    },
}

fn parse_item(value: &str) -> Result<ItemEntry, String> {
    let (name, quantity) = value
        .rsplit_once(',')
        .ok_or_else(|| format!("expected Name,Qty but got {value:?}"))?;

    let quantity = quantity
        .trim()
        .parse::<u32>()
        .map_err(|err| format!("invalid quantity in {value:?}: {err}"))?;

    Ok(ItemEntry::new(name.trim(), quantity))
}

fn main() -> ExitCode {
    let _env = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_err| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let catalog = CatalogLoader::from_config(&config)?;
    let settings = Settings::from_config(&config)?;
    let mut session = Session::open(catalog, settings, CsvStore::from_config(&config))?;

    let mut out = io::stdout().lock();
    let result = execute(&mut session, cli.command, &mut out);

    session.close()?;

    result
}

fn execute(session: &mut Session<CsvStore>, command: Command, out: &mut impl Write) -> Result<(), CliError> {
    match command {
        Command::Restaurants => write_restaurants(session.catalog(), out)?,
        Command::Orders { customer } => {
            let orders = match customer {
                Some(customer) => session.orders_for_customer(&customer)?,
                None => session.orders(),
            };

            write_orders(session.catalog(), &orders, out)?;
        }
        Command::Queue { restaurant, count } => {
            let orders = session.front_window(&restaurant, count.unwrap_or(usize::MAX))?;

            write_orders(session.catalog(), &orders, out)?;
        }
        Command::Create(args) => {
            let draft = OrderDraft {
                customer_email: args.customer,
                restaurant_id: args.restaurant,
                delivery_at: args.delivery,
                delivery_address: args.address,
                items: args.items,
                special_request: args.request,
                offer_code: args.offer,
                payment: args.payment,
            };

            let id = session.create_order(draft, Zoned::now().datetime())?;
            let total = session.order(id).map(Order::total).unwrap_or_else(|| amount(0));

            writeln!(out, "Order {id} created, total {}", format_amount(&total))?;
        }
        Command::Confirm { order } => transition(session, order, Action::Confirm, out)?,
        Command::Reject { order } => transition(session, order, Action::Reject, out)?,
        Command::Deliver { order } => transition(session, order, Action::Deliver, out)?,
        Command::Process {
            restaurant,
            action,
            count,
        } => {
            let processed = session.process_front(&restaurant, action.into(), count)?;

            if processed.is_empty() {
                writeln!(out, "No orders queued at {restaurant}")?;
            }

            for Processed { order, outcome } in processed {
                match outcome {
                    Ok(transition) => writeln!(out, "Order {order}: {} -> {}", transition.from, transition.to)?,
                    Err(err) => writeln!(out, "Order {order}: {err}")?,
                }
            }
        }
        Command::Cancel { customer, order } => {
            session.cancel(&customer, order)?;

            writeln!(out, "Order {order} cancelled, refund recorded")?;
        }
        Command::Modify(args) => modify(session, args, out)?,
        Command::Bulk { now } => {
            let report = session.bulk_process(now.unwrap_or_else(|| Zoned::now().datetime()))?;

            write_bulk_report(&report, out)?;
        }
        Command::Report => session.financial_report()?.write_to(out)?,
    }

    Ok(())
}

fn transition(
    session: &mut Session<CsvStore>,
    order: OrderId,
    action: Action,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let transition = session.apply(order, action)?;

    writeln!(out, "Order {order}: {} -> {}", transition.from, transition.to)?;

    Ok(())
}

fn modify(session: &mut Session<CsvStore>, args: ModifyArgs, out: &mut impl Write) -> Result<(), CliError> {
    let ModifyArgs {
        customer,
        order,
        items,
        address,
        time,
        accept_difference,
    } = args;

    let delivery_time = time.as_deref().map(parse_time).transpose()?;

    if !items.is_empty() {
        let quote = session.quote_items(&customer, order, &items)?;

        if quote.is_increase() && !accept_difference {
            return Err(CliError::DifferenceNotAccepted {
                previous: format_amount(&quote.previous),
                updated: format_amount(&quote.updated),
                difference: format_amount(&quote.difference()?),
            });
        }
    }

    let changes = OrderChanges {
        items: (!items.is_empty()).then_some(items),
        address,
        delivery_time,
    };

    if let Some(quote) = session.modify_order(&customer, order, changes)? {
        writeln!(
            out,
            "Order {order}: total {} -> {}",
            format_amount(&quote.previous),
            format_amount(&quote.updated)
        )?;
    }

    if let Some(modified) = session.order(order) {
        writeln!(
            out,
            "Order {order}: delivering to {} at {}",
            modified.delivery_address(),
            format_date_time(modified.delivery_at())
        )?;
    }

    Ok(())
}

fn write_restaurants(catalog: &Catalog, out: &mut impl Write) -> io::Result<()> {
    for (_, restaurant) in catalog.restaurants() {
        let mut builder = Builder::default();

        builder.push_record(["Item", "Description", "Price"]);

        for item in restaurant.menu.items().iter().filter_map(|key| catalog.food_item(*key)) {
            builder.push_record([item.name.clone(), item.description.clone(), format_amount(&item.price)]);
        }

        let mut table = builder.build();
        table.with(Style::modern_rounded());

        writeln!(out, "{restaurant} <{}>", restaurant.email)?;
        writeln!(out, "{table}")?;

        for offer in &restaurant.offers {
            writeln!(out, "  {}: {} ({}% off)", offer.code, offer.description, offer.discount)?;
        }

        writeln!(out)?;
    }

    Ok(())
}

fn write_orders(catalog: &Catalog, orders: &[&Order], out: &mut impl Write) -> io::Result<()> {
    let mut builder = Builder::default();

    builder.push_record(["Order", "Customer", "Restaurant", "Delivery", "Address", "Total", "Status"]);

    for order in orders {
        let customer = catalog
            .customer_key(order.customer_email())
            .and_then(|key| catalog.customer(key))
            .map_or_else(|| order.customer_email().to_string(), |customer| customer.name.clone());

        let restaurant = catalog
            .restaurant_key(order.restaurant_id())
            .and_then(|key| catalog.restaurant(key))
            .map_or_else(|| order.restaurant_id().to_string(), |restaurant| restaurant.name.clone());

        builder.push_record([
            order.id().to_string(),
            customer,
            restaurant,
            format_date_time(order.delivery_at()),
            order.delivery_address().to_string(),
            format_amount(&order.total()),
            order.status().to_string(),
        ]);
    }

    let mut table = builder.build();
    table.with(Style::modern_rounded());

    writeln!(out, "{table}")
}

fn write_bulk_report(report: &BulkReport, out: &mut impl Write) -> io::Result<()> {
    let mut builder = Builder::default();

    builder.push_record(["Queued", "Due today", "Processed", "Preparing", "Rejected", "Processed %"]);
    builder.push_record([
        report.queued_total.to_string(),
        report.candidates.to_string(),
        report.processed.to_string(),
        report.preparing.to_string(),
        report.rejected.to_string(),
        format!("{:.2}", report.processed_percentage()),
    ]);

    let mut table = builder.build();
    table.with(Style::modern_rounded());

    writeln!(out, "{table}")
}
