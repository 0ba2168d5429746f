use kosh_core::Resolver;

use crate::cli::OutputFormat;
use crate::client::{AppContext, CliResult};
use crate::output::render_product;

/// Look up one hardware product by id, name, alias, or id prefix.
pub(crate) async fn handle_product_get(
    ctx: &AppContext,
    key: &str,
    format: OutputFormat,
) -> CliResult<()> {
    let mut resolver = Resolver::new(ctx.inventory());
    let product = resolver.product(key).await?;
    render_product(&product, format)
}
