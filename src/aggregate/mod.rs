pub mod store;

pub use store::{
    eu_aggregate_id, Cell, EuSide, GroupKey, GroupValue, MetaPartners, SeriesKey, StoreFilter,
    TradeStore,
};
