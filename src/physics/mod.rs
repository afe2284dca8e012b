//! Air-side physics: resistance curves, the blower curve, particle transport
//! factors and the solvers that tie them together.

pub mod fan;
pub mod flow_balance;
pub mod implicit;
pub mod particles;
pub mod resistance;
pub mod units;
