use proptest::prelude::*;
use scoresync::Error;
use scoresync::score::{ScoreElement, score_chroma};

fn element() -> impl Strategy<Value = (bool, i32, u64, Option<u64>)> {
    (
        any::<bool>(),
        0i32..128,
        0u64..4000,
        prop::option::weighted(0.85, 0u64..1500),
    )
}

fn build(specs: &[(bool, i32, u64, Option<u64>)]) -> Vec<ScoreElement> {
    specs
        .iter()
        .enumerate()
        .map(|(i, &(rest, pitch, onset, duration))| {
            let id = format!("e{i}");
            let element = if rest {
                ScoreElement::rest(id, onset, duration.unwrap_or(0))
            } else {
                ScoreElement::note(id, pitch, onset, duration.unwrap_or(0))
            };
            if duration.is_some() {
                element
            } else {
                element.without_duration()
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn index_holds_every_duration_bearing_element(specs in prop::collection::vec(element(), 1..40)) {
        let elements = build(&specs);
        let shortest = elements.iter().filter_map(|e| e.duration).filter(|&d| d > 0).min();

        match score_chroma(&elements) {
            Ok(chroma) => {
                let durated = elements.iter().filter(|e| e.duration.is_some()).count();
                prop_assert_eq!(chroma.index.len(), durated);
                for e in elements.iter().filter(|e| e.duration.is_none()) {
                    prop_assert!(!chroma.index.contains_key(&e.identifier));
                }
                prop_assert_eq!(Some(chroma.grid_ticks), shortest);
                prop_assert!(chroma.index.values().all(|&col| col < chroma.columns()));
            }
            Err(Error::EmptyScore) => prop_assert!(shortest.is_none()),
            Err(e) => prop_assert!(false, "unexpected error {e}"),
        }
    }

    #[test]
    fn rows_peak_at_one_or_stay_silent(specs in prop::collection::vec(element(), 1..40)) {
        let elements = build(&specs);
        if let Ok(chroma) = score_chroma(&elements) {
            prop_assert_eq!(chroma.matrix.shape()[0], 12);
            for row in chroma.matrix.rows() {
                let peak = row.iter().fold(0.0f32, |m, v| m.max(v.abs()));
                prop_assert!(peak == 0.0 || (peak - 1.0).abs() < 1e-6, "row peak {peak}");
                prop_assert!(row.iter().all(|&v| v >= 0.0));
            }
        }
    }
}

#[test]
fn width_is_ceiling_of_span_over_grid() {
    let elements = [
        ScoreElement::note("a", 60, 0, 300),
        ScoreElement::note("b", 62, 300, 400),
    ];
    let chroma = score_chroma(&elements).unwrap();
    // 700 / 300 rounded up
    assert_eq!(chroma.columns(), 3);
    assert_eq!(chroma.index["b"], 1);
    assert_eq!(chroma.matrix.row(2).to_vec(), vec![0.0, 1.0, 1.0]);
}
