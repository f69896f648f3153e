pub mod entities;
pub mod pricing;
pub mod repositories;
pub mod services;
pub mod tag_index;
pub mod team_naming;

pub use entities::*;
pub use gigmarket_core::{MarketError, MarketResult};
pub use pricing::{PriceDirection, ALLOWED_PERCENTAGES};
pub use repositories::*;
pub use services::*;
pub use tag_index::TagIndex;
pub use team_naming::generate_team_name;
