//! Treasury inflow model
//!
//! ```text
//! monetary_expansion_est = ρ × reserves_start
//! inflow_est             = τ × (fees + ρ × reserves_start)
//! ```
//!
//! With ρ = a/b and τ = c/d the inflow is evaluated as
//! `floor(c × (fees × b + reserves × a) / (d × b))`, so the expansion term is
//! never rounded before it feeds the inflow.

use serde::{Deserialize, Serialize};

use super::errors::{EstimatorError, EstimatorResult};
use crate::money::Rate;
use crate::snapshot::PeriodSnapshot;

/// Model output for one period, smallest unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEstimate {
    pub monetary_expansion_est: i64,
    pub inflow_est: i64,
}

/// Estimate one period's treasury inflow. Pure.
pub fn estimate(snapshot: &PeriodSnapshot) -> EstimatorResult<FlowEstimate> {
    let fees = snapshot.fees;
    if fees < 0 {
        return Err(EstimatorError::invalid("fees", fees, "must be non-negative"));
    }

    let reserves = snapshot
        .reserves_balance_start
        .ok_or(EstimatorError::MissingInput("reserves_balance_start"))?;
    if reserves < 0 {
        return Err(EstimatorError::invalid(
            "reserves_balance_start",
            reserves,
            "must be non-negative",
        ));
    }

    let rho = checked_rate("expansion_rate", snapshot.expansion_rate)?;
    let tau = checked_rate("treasury_growth_rate", snapshot.treasury_growth_rate)?;

    estimate_from_parts(fees, reserves, rho, tau)
}

fn checked_rate(name: &'static str, rate: Option<Rate>) -> EstimatorResult<Rate> {
    let rate = rate.ok_or_else(|| EstimatorError::invalid(name, "null", "rate not reported"))?;
    if !rate.is_unit_interval() {
        return Err(EstimatorError::invalid(name, rate, "must lie in [0, 1]"));
    }
    Ok(rate)
}

fn estimate_from_parts(fees: i64, reserves: i64, rho: Rate, tau: Rate) -> EstimatorResult<FlowEstimate> {
    let overflow = || EstimatorError::invalid("reserves_balance_start", reserves, "exceeds arithmetic range");

    let a = rho.numerator() as i128;
    let b = rho.denominator() as i128;
    let c = tau.numerator() as i128;
    let d = tau.denominator() as i128;
    let fees = fees as i128;
    let reserves = reserves as i128;

    let expansion_scaled = reserves.checked_mul(a).ok_or_else(overflow)?;
    let expansion = expansion_scaled.div_euclid(b);

    let pool_scaled = fees
        .checked_mul(b)
        .and_then(|f| f.checked_add(expansion_scaled))
        .ok_or_else(overflow)?;
    let inflow = pool_scaled
        .checked_mul(c)
        .ok_or_else(overflow)?
        .div_euclid(d.checked_mul(b).ok_or_else(overflow)?);

    Ok(FlowEstimate {
        monetary_expansion_est: i64::try_from(expansion).map_err(|_| overflow())?,
        inflow_est: i64::try_from(inflow).map_err(|_| overflow())?,
    })
}
