use std::collections::HashMap;
use std::f64::consts::PI;

use num_complex::Complex64;

use crate::basic::error::ConfigError;
use crate::basic::three_phase::{
    fortescue::Triplet,
    network::{
        BranchKind, BusShunt, BusTable, PhaseDemand, SequenceBranch, SequenceModel, SequencePi,
        SourceEquivalent,
    },
};
use crate::io::pandapower::*;

/// Network-wide bases used during parameter derivation.
#[derive(Debug, Clone, Copy)]
struct Bases {
    sn_mva: f64,
    omega: f64,
}

impl Bases {
    /// Impedance base in ohm for a bus voltage level.
    fn z_base(&self, vn_kv: f64) -> f64 {
        vn_kv * vn_kv / self.sn_mva
    }
}

/// Maps external bus ids to positions in the bus table.
fn bus_lookup(bus: &[Bus]) -> Result<HashMap<i64, usize>, ConfigError> {
    let mut lookup = HashMap::with_capacity(bus.len());
    for (position, b) in bus.iter().enumerate() {
        if lookup.insert(b.index, position).is_some() {
            return Err(ConfigError::DuplicateBus { bus: b.index });
        }
        if b.in_service && !(b.vn_kv > 0.0) {
            return Err(ConfigError::InvalidParameter {
                element: "bus",
                position,
                what: format!("vn_kv must be positive, got {}", b.vn_kv),
            });
        }
    }
    Ok(lookup)
}

fn resolve(
    lookup: &HashMap<i64, usize>,
    element: &'static str,
    position: usize,
    bus: i64,
) -> Result<usize, ConfigError> {
    lookup.get(&bus).copied().ok_or(ConfigError::UnknownBus {
        element,
        position,
        bus,
    })
}

fn invalid(element: &'static str, position: usize, what: String) -> ConfigError {
    ConfigError::InvalidParameter {
        element,
        position,
        what,
    }
}

/// Pi model of a line in one sequence, from per-length data.
///
/// `parallel` identical systems divide the series impedance and multiply the shunt.
fn line_pi(
    bases: &Bases,
    vn_kv: f64,
    line: &Line,
    r: f64,
    x: f64,
    c_nf: f64,
    g_us: f64,
) -> SequencePi {
    let z_base = bases.z_base(vn_kv);
    let parallel = line.parallel as f64;
    let z = Complex64::new(r, x) * line.length_km / parallel;
    let y_sh = Complex64::new(g_us * 1e-6, bases.omega * c_nf * 1e-9) * line.length_km * parallel;
    let half = 0.5 * y_sh * z_base;
    SequencePi {
        series: z_base / z,
        shunt_from: half,
        shunt_to: half,
    }
}

/// Converts a line to its sequence branch.
fn line_to_branch(
    bases: &Bases,
    bus: &[Bus],
    lookup: &HashMap<i64, usize>,
    position: usize,
    line: &Line,
) -> Result<SequenceBranch, ConfigError> {
    let from = resolve(lookup, "line", position, line.from_bus)?;
    let to = resolve(lookup, "line", position, line.to_bus)?;
    if line.in_service {
        if line.parallel == 0 {
            return Err(invalid("line", position, "parallel must be at least 1".into()));
        }
        if !(line.length_km > 0.0) {
            return Err(invalid(
                "line",
                position,
                format!("length_km must be positive, got {}", line.length_km),
            ));
        }
        if line.r_ohm_per_km == 0.0 && line.x_ohm_per_km == 0.0 {
            return Err(invalid("line", position, "zero series impedance".into()));
        }
        if line.r0_ohm_per_km == 0.0 && line.x0_ohm_per_km == 0.0 {
            return Err(invalid(
                "line",
                position,
                "zero zero-sequence impedance".into(),
            ));
        }
    }
    let vn_kv = bus[from].vn_kv;
    let pos = line_pi(
        bases,
        vn_kv,
        line,
        line.r_ohm_per_km,
        line.x_ohm_per_km,
        line.c_nf_per_km,
        line.g_us_per_km,
    );
    let zero = line_pi(
        bases,
        vn_kv,
        line,
        line.r0_ohm_per_km,
        line.x0_ohm_per_km,
        line.c0_nf_per_km,
        line.g0_us_per_km,
    );
    Ok(SequenceBranch {
        kind: BranchKind::Line,
        index: line.index,
        position,
        from,
        to,
        in_service: line.in_service,
        rated_ka: line.max_i_ka * line.df * line.parallel as f64,
        pi: [Some(zero), Some(pos), Some(pos)],
    })
}

/// Converts a per-unit impedance element to its sequence branch.
///
/// The element values are rescaled from its own rating to the system base.
fn impedance_to_branch(
    bases: &Bases,
    bus: &[Bus],
    lookup: &HashMap<i64, usize>,
    position: usize,
    imp: &Impedance,
) -> Result<SequenceBranch, ConfigError> {
    let from = resolve(lookup, "impedance", position, imp.from_bus)?;
    let to = resolve(lookup, "impedance", position, imp.to_bus)?;
    if imp.in_service {
        if !(imp.sn_mva > 0.0) {
            return Err(invalid(
                "impedance",
                position,
                format!("sn_mva must be positive, got {}", imp.sn_mva),
            ));
        }
        if imp.rft_pu == 0.0 && imp.xft_pu == 0.0 {
            return Err(invalid("impedance", position, "zero series impedance".into()));
        }
    }
    let rescale = bases.sn_mva / imp.sn_mva;
    let series = |r: f64, x: f64| SequencePi {
        series: 1.0 / (Complex64::new(r, x) * rescale),
        ..Default::default()
    };
    let pos = series(imp.rft_pu, imp.xft_pu);
    let zero = match (imp.rft0_pu, imp.xft0_pu) {
        (Some(r0), Some(x0)) if r0 != 0.0 || x0 != 0.0 => Some(series(r0, x0)),
        _ => None,
    };
    Ok(SequenceBranch {
        kind: BranchKind::Impedance,
        index: imp.index,
        position,
        from,
        to,
        in_service: imp.in_service,
        rated_ka: imp.sn_mva / (3f64.sqrt() * bus[from].vn_kv),
        pi: [zero, Some(pos), Some(pos)],
    })
}

/// Converts a shunt to its sequence admittances, referred to the bus voltage.
fn shunt_to_admit(
    bases: &Bases,
    bus: &[Bus],
    lookup: &HashMap<i64, usize>,
    position: usize,
    item: &Shunt,
) -> Result<BusShunt, ConfigError> {
    let b = resolve(lookup, "shunt", position, item.bus)?;
    let bus_kv = bus[b].vn_kv;
    let ratio = item.vn_kv.map_or(1.0, |vn| (bus_kv / vn).powi(2));
    let scale = item.step as f64 * ratio / bases.sn_mva;
    let y1 = Complex64::new(item.p_mw, -item.q_mvar) * scale;
    let y0 = match (item.p0_mw, item.q0_mvar) {
        (None, None) => Complex64::new(0.0, 0.0),
        (p0, q0) => Complex64::new(p0.unwrap_or(0.0), -q0.unwrap_or(0.0)) * scale,
    };
    Ok(BusShunt {
        bus: b,
        in_service: item.in_service,
        y: Triplet::new(y0, y1, y1),
    })
}

/// Converts the external grid to its short-circuit equivalent.
///
/// `|Z| = c · S_base / S_sc`, `X1 = |Z| / √(1 + (R/X)²)`, `X0 = (X0/X) · X1`,
/// `R0 = (R0/X0) · X0`; the negative sequence equals the positive one.
fn extgrid_to_source(
    bases: &Bases,
    lookup: &HashMap<i64, usize>,
    bus: &[Bus],
    position: usize,
    item: &ExtGrid,
) -> Result<SourceEquivalent, ConfigError> {
    let b = *lookup
        .get(&item.bus)
        .ok_or(ConfigError::SourceBusMissing { bus: item.bus })?;
    if !bus[b].in_service {
        return Err(ConfigError::SourceOutOfService { bus: item.bus });
    }
    let r0x0 = item.r0x0_max.ok_or(ConfigError::MissingZeroSequence {
        bus: item.bus,
        field: "r0x0_max",
    })?;
    let x0x = item.x0x_max.ok_or(ConfigError::MissingZeroSequence {
        bus: item.bus,
        field: "x0x_max",
    })?;
    if !(item.s_sc_max_mva > 0.0) {
        return Err(invalid(
            "ext_grid",
            position,
            format!("s_sc_max_mva must be positive, got {}", item.s_sc_max_mva),
        ));
    }
    if !(x0x > 0.0) {
        return Err(invalid(
            "ext_grid",
            position,
            format!("x0x_max must be positive, got {x0x}"),
        ));
    }

    let z = item.c_max * bases.sn_mva / item.s_sc_max_mva;
    let x1 = z / (1.0 + item.rx_max * item.rx_max).sqrt();
    let r1 = item.rx_max * x1;
    let x0 = x0x * x1;
    let r0 = r0x0 * x0;
    let y1 = 1.0 / Complex64::new(r1, x1);
    let y0 = 1.0 / Complex64::new(r0, x0);
    Ok(SourceEquivalent {
        bus: b,
        v1: Complex64::from_polar(item.vm_pu, item.va_degree.to_radians()),
        y: Triplet::new(y0, y1, y1),
    })
}

/// Accumulates the per-phase demand of all in-service loads.
fn collect_demand(
    bases: &Bases,
    lookup: &HashMap<i64, usize>,
    n_bus: usize,
    load: &[Load],
    asymmetric: &[AsymmetricLoad],
) -> Result<PhaseDemand, ConfigError> {
    let mut demand = PhaseDemand(vec![Triplet::zeros(); n_bus]);
    // per-phase base is S_base / 3
    let phase_base = bases.sn_mva / 3.0;
    for (position, item) in load.iter().enumerate() {
        let b = resolve(lookup, "load", position, item.bus)?;
        if !item.in_service {
            continue;
        }
        let s = Complex64::new(item.p_mw, item.q_mvar) * item.scaling / 3.0 / phase_base;
        demand[b] += Triplet::new(s, s, s);
    }
    for (position, item) in asymmetric.iter().enumerate() {
        let b = resolve(lookup, "asymmetric_load", position, item.bus)?;
        if !item.in_service {
            continue;
        }
        let scale = item.scaling / phase_base;
        demand[b] += Triplet::new(
            Complex64::new(item.p_a_mw, item.q_a_mvar) * scale,
            Complex64::new(item.p_b_mw, item.q_b_mvar) * scale,
            Complex64::new(item.p_c_mw, item.q_c_mvar) * scale,
        );
    }
    Ok(demand)
}

/// Selects the single in-service external grid and its table position.
fn select_source(ext_grid: &[ExtGrid]) -> Result<(usize, &ExtGrid), ConfigError> {
    let mut active = ext_grid.iter().enumerate().filter(|(_, e)| e.in_service);
    match (active.next(), active.count()) {
        (None, _) => Err(ConfigError::NoSource),
        (Some(e), 0) => Ok(e),
        (Some(_), more) => Err(ConfigError::MultipleSources { count: more + 1 }),
    }
}

impl TryFrom<&Network> for SequenceModel {
    type Error = ConfigError;

    fn try_from(value: &Network) -> Result<Self, Self::Error> {
        if !(value.sn_mva > 0.0) || !(value.f_hz > 0.0) {
            return Err(invalid(
                "network",
                0,
                format!(
                    "sn_mva and f_hz must be positive, got {} and {}",
                    value.sn_mva, value.f_hz
                ),
            ));
        }
        let bases = Bases {
            sn_mva: value.sn_mva,
            omega: 2.0 * PI * value.f_hz,
        };
        let bus = &value.bus;
        let lookup = bus_lookup(bus)?;

        let (ext_position, ext) = select_source(value.ext_grid.as_deref().unwrap_or_default())?;
        let source = extgrid_to_source(&bases, &lookup, bus, ext_position, ext)?;

        let lines = value.line.as_deref().unwrap_or_default();
        let impedances = value.impedance.as_deref().unwrap_or_default();
        let mut branches = Vec::with_capacity(lines.len() + impedances.len());
        for (position, line) in lines.iter().enumerate() {
            branches.push(line_to_branch(&bases, bus, &lookup, position, line)?);
        }
        for (position, imp) in impedances.iter().enumerate() {
            branches.push(impedance_to_branch(&bases, bus, &lookup, position, imp)?);
        }

        let shunts = value
            .shunt
            .as_deref()
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(position, s)| shunt_to_admit(&bases, bus, &lookup, position, s))
            .collect::<Result<Vec<_>, _>>()?;

        let demand = collect_demand(
            &bases,
            &lookup,
            bus.len(),
            value.load.as_deref().unwrap_or_default(),
            value.asymmetric_load.as_deref().unwrap_or_default(),
        )?;

        Ok(SequenceModel {
            buses: BusTable {
                ids: bus.iter().map(|b| b.index).collect(),
                vn_kv: bus.iter().map(|b| b.vn_kv).collect(),
                in_service: bus.iter().map(|b| b.in_service).collect(),
            },
            branches,
            shunts,
            source,
            demand,
            sn_mva: bases.sn_mva,
        })
    }
}
