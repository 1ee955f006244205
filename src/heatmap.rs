use serde::{Deserialize, Serialize};

use crate::models::TapEvent;

/// A tap position normalized to the unit square.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HeatmapPoint {
    pub x: f64,
    pub y: f64,
}

/// Fills in whichever of `nx`/`ny` is missing from the matching raw
/// coordinate, once device dimensions are known. Values already present are
/// never overwritten.
pub fn normalize_tap(tap: &mut TapEvent, dims: Option<(u32, u32)>) {
    let Some((width, height)) = dims else {
        return;
    };
    if tap.nx.is_none() {
        tap.nx = normalize_axis(tap.x, width);
    }
    if tap.ny.is_none() {
        tap.ny = normalize_axis(tap.y, height);
    }
}

fn normalize_axis(raw: Option<f64>, extent: u32) -> Option<f64> {
    if extent == 0 {
        return None;
    }
    raw.map(|value| value / f64::from(extent))
}

/// Projects taps onto heatmap points, optionally restricted to one screen.
/// Taps that cannot be normalized or land outside the screen are dropped.
pub fn points(taps: &[TapEvent], screen: Option<&str>, dims: Option<(u32, u32)>) -> Vec<HeatmapPoint> {
    taps.iter()
        .filter(|tap| match screen {
            Some(name) => tap.screen.as_deref() == Some(name),
            None => true,
        })
        .filter_map(|tap| {
            let mut tap = tap.clone();
            normalize_tap(&mut tap, dims);
            let point = HeatmapPoint {
                x: tap.nx?,
                y: tap.ny?,
            };
            in_unit_square(&point).then_some(point)
        })
        .collect()
}

fn in_unit_square(point: &HeatmapPoint) -> bool {
    (0.0..=1.0).contains(&point.x) && (0.0..=1.0).contains(&point.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap_on(screen: &str, x: f64, y: f64) -> TapEvent {
        TapEvent {
            screen: Some(screen.into()),
            ..TapEvent::at(x, y, 0)
        }
    }

    #[test]
    fn normalizes_from_device_dimensions() {
        let mut tap = TapEvent::at(100.0, 300.0, 1);
        normalize_tap(&mut tap, Some((400, 600)));
        assert_eq!(tap.nx, Some(0.25));
        assert_eq!(tap.ny, Some(0.5));
    }

    #[test]
    fn never_fabricates_without_dimensions_or_raw() {
        let mut tap = TapEvent::at(100.0, 300.0, 1);
        normalize_tap(&mut tap, None);
        assert_eq!(tap.nx, None);

        let mut no_raw = TapEvent {
            timestamp: Some(1),
            ..TapEvent::default()
        };
        normalize_tap(&mut no_raw, Some((400, 600)));
        assert_eq!(no_raw.nx, None);
        assert_eq!(no_raw.ny, None);
    }

    #[test]
    fn derives_only_the_missing_axis() {
        let mut tap = TapEvent {
            nx: Some(0.9),
            ..TapEvent::at(100.0, 300.0, 1)
        };
        normalize_tap(&mut tap, Some((400, 600)));
        assert_eq!(tap.nx, Some(0.9));
        assert_eq!(tap.ny, Some(0.5));

        let mut only_x = TapEvent {
            x: Some(200.0),
            ..TapEvent::default()
        };
        normalize_tap(&mut only_x, Some((400, 600)));
        assert_eq!(only_x.nx, Some(0.5));
        assert_eq!(only_x.ny, None);
    }

    #[test]
    fn keeps_existing_normalized_coordinates() {
        let mut tap = TapEvent {
            nx: Some(0.9),
            ny: Some(0.1),
            ..TapEvent::at(100.0, 300.0, 1)
        };
        normalize_tap(&mut tap, Some((400, 600)));
        assert_eq!(tap.nx, Some(0.9));
        assert_eq!(tap.ny, Some(0.1));
    }

    #[test]
    fn filters_by_screen_and_drops_out_of_bounds() {
        let taps = vec![
            tap_on("Home", 200.0, 300.0),
            tap_on("Settings", 10.0, 10.0),
            tap_on("Home", 800.0, 300.0),
            TapEvent {
                screen: Some("Home".into()),
                x: None,
                y: None,
                ..TapEvent::default()
            },
        ];

        let home = points(&taps, Some("Home"), Some((400, 600)));
        assert_eq!(home, vec![HeatmapPoint { x: 0.5, y: 0.5 }]);

        let all = points(&taps, None, Some((400, 600)));
        assert_eq!(all.len(), 2);
    }
}
