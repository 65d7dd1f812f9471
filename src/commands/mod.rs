pub mod admin;
pub mod broadcast;
pub mod general;

pub use admin::{confirm, deliveries, pending, report};
pub use broadcast::{broadcast, cancel};
pub use general::{help, ping, start};

use crate::Context;

/// All admin-only operations compare the caller against the one configured
/// operator identity; there are no roles or permission tiers.
pub(crate) fn is_operator(ctx: &Context<'_>) -> bool {
    ctx.author().id == ctx.data().config.operator_id
}

/// Reply with a refusal if the caller is not the operator.
pub(crate) async fn require_operator(ctx: &Context<'_>) -> Result<bool, crate::Error> {
    if is_operator(ctx) {
        return Ok(true);
    }
    ctx.send(
        poise::CreateReply::default()
            .content("This command is reserved for the operator.")
            .ephemeral(true),
    )
    .await?;
    Ok(false)
}
