//! Everything that talks to the platform contracts
//!
//! | Module     | Direction                                     |
//! |------------|-----------------------------------------------|
//! | `reader`   | `eth_call` reads, decoded into domain types   |
//! | `prepared` | investor writes, returned unsigned            |
//! | `admin`    | admin writes, signed by the canister          |
//! | `status`   | receipts of submitted transactions            |

pub mod admin;
pub mod lock;
pub mod prepared;
pub mod reader;
pub mod status;
