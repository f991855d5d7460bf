/// Column-name constants for vessel-drift-hazard tables.
/// Single source of truth for every DataFrame produced by this crate.

// ── Catalog point tables ────────────────────────────────────────────────────
pub mod locs {
    pub const LON: &str = "lon";
    pub const LAT: &str = "lat";
    pub const ESI_ID: &str = "esi_id";
    pub const ESI_CODE: &str = "esi_code";
    pub const BC_CLASS: &str = "bc_class";
    pub const GRS_CODE: &str = "grs_code";
    pub const COUNT: &str = "counts";
}

// ── Per-particle drift hazard columns ───────────────────────────────────────
pub mod drift {
    pub const PT: &str = "pt";
    pub const PB: &str = "pb";
    pub const STRANDING_HAZARD: &str = "stranding_hazard";
    pub const BREACH_PROB: &str = "breach_prob";
    pub const ESI_ID: &str = "esi_id";
    pub const REGION: &str = "region";
}

// ── Per-segment spill hazard columns ────────────────────────────────────────
pub mod spill {
    pub const OIL_MASS: &str = "oil_mass";
    pub const CS: &str = "cs";
    pub const PB: &str = "pb";
    pub const PARTICLE_HITS: &str = "particle_hits";
    pub const ESI_ID: &str = "esi_id";
    pub const REGION: &str = "region";
}

// ── Run metadata added at aggregation ───────────────────────────────────────
pub mod run {
    pub const DATE: &str = "date";
    pub const VESSEL_TYPE: &str = "vessel_type";
}

// ── Combined hazard / risk columns ──────────────────────────────────────────
pub mod hazard {
    pub const BREACH_HAZARD: &str = "breach_hazard";
    pub const HZ_S: &str = "hz_s";
    pub const SPILL_HAZARD: &str = "spill_hazard";
    pub const SPILL_RISK: &str = "spill_risk";
    pub const ESI: &str = "esi";
    pub const REGION: &str = "region";
}
