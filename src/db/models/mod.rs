mod checkpoint;
mod event;
mod liquidity;
mod nft_mint;
mod price_update;
mod swap;
mod transfer;

pub use checkpoint::Checkpoint;
pub use event::DomainEvent;
pub use liquidity::{LiquidityEvent, LiquidityKind};
pub use nft_mint::NftMintEvent;
pub use price_update::PriceUpdateEvent;
pub use swap::{SwapDirection, SwapEvent};
pub use transfer::TransferEvent;
