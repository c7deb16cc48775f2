pub mod select;

pub use select::{
    AnchorSelector,
    DEFAULT_FRUSTUM_BOUNDS,
};
