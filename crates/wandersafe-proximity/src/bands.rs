//! Latitude-band candidate index.
//!
//! For latitudes in [-90, 90] the haversine distance is never below
//! `R·|Δlat|`. A band of 0.01° spans about 1.11 km, so two sessions whose
//! bands differ by more than one cannot be within range and are skipped.
//! Sessions with a latitude outside [-90, 90] break that bound; they are
//! compared against everyone.

use std::collections::BTreeMap;

use crate::session::Session;

/// Band height in degrees.
const BAND_DEG: f64 = 0.01;

/// Sessions bucketed by latitude band, by index into the snapshot slice.
pub(crate) struct LatitudeBands {
    band_of: Vec<Option<i64>>,
    bands: BTreeMap<i64, Vec<usize>>,
    unbanded: Vec<usize>,
    total: usize,
}

impl LatitudeBands {
    pub(crate) fn build(sessions: &[Session]) -> Self {
        let mut bands: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        let mut unbanded = Vec::new();
        let band_of = sessions
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let band = band(s.position.lat);
                match band {
                    Some(b) => bands.entry(b).or_default().push(i),
                    None => unbanded.push(i),
                }
                band
            })
            .collect();
        Self {
            band_of,
            bands,
            unbanded,
            total: sessions.len(),
        }
    }

    /// Ascending candidate indices for `viewer`, never including `viewer`.
    pub(crate) fn candidates(&self, viewer: usize) -> Vec<usize> {
        let Some(b) = self.band_of[viewer] else {
            return (0..self.total).filter(|&j| j != viewer).collect();
        };
        let mut out: Vec<usize> = self
            .bands
            .range(b - 1..=b + 1)
            .flat_map(|(_, members)| members.iter().copied())
            .chain(self.unbanded.iter().copied())
            .filter(|&j| j != viewer)
            .collect();
        out.sort_unstable();
        out
    }
}

fn band(lat: f64) -> Option<i64> {
    (-90.0..=90.0)
        .contains(&lat)
        .then(|| (lat / BAND_DEG).floor() as i64)
}
