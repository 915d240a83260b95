/*!

These are generic structures and algorithms: they do not depend on anything specific to this codebase or application.

*/

mod moving_average;
mod statistics;

pub use moving_average::{EMA, ExponentialMovingAverage};
pub use statistics::{Statistic, Statistics};

/*
/// Collection Literals
macro_rules! collection {
    // map-like
    ($($k:expr => $v:expr),* $(,)?) => {{
        use std::iter::{Iterator, IntoIterator};
        Iterator::collect(IntoIterator::into_iter([$(($k, $v),)*]))
    }};
    // set-like
    ($($v:expr),* $(,)?) => {{
        use std::iter::{Iterator, IntoIterator};
        Iterator::collect(IntoIterator::into_iter([$($v,)*]))
    }};
}
*/
