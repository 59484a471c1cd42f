//! Data capacity units for sizing the sheet budget.
//!
//! Binary multiples for bytes, decimal multiples for bits.

/// Capacities expressed in bytes.
pub mod bytes {
    pub const KIB: u64 = 1 << 10;
    pub const MIB: u64 = 1 << 20;
    pub const GIB: u64 = 1 << 30;
    pub const TIB: u64 = 1 << 40;
    pub const PIB: u64 = 1 << 50;

    pub const KILOBIT: u64 = 125;
    pub const MEGABIT: u64 = 125_000;
    pub const GIGABIT: u64 = 125_000_000;
    pub const TERABIT: u64 = 125_000_000_000;
    pub const PETABIT: u64 = 125_000_000_000_000;
}

/// Capacities expressed in bits.
pub mod bits {
    pub const KIB: u64 = super::bytes::KIB * 8;
    pub const MIB: u64 = super::bytes::MIB * 8;
    pub const GIB: u64 = super::bytes::GIB * 8;
    pub const TIB: u64 = super::bytes::TIB * 8;
    pub const PIB: u64 = super::bytes::PIB * 8;

    pub const KILOBIT: u64 = 1_000;
    pub const MEGABIT: u64 = 1_000_000;
    pub const GIGABIT: u64 = 1_000_000_000;
    pub const TERABIT: u64 = 1_000_000_000_000;
    pub const PETABIT: u64 = 1_000_000_000_000_000;
}

pub use bytes::{GIB, KIB, MIB, PIB, TIB};
