use crate::model::ImageRecord;
use std::cmp::Ordering;

/// Orders records by capture time. Dated records come first, earliest first;
/// undated records follow in numeric-aware filename order. Equal timestamps
/// fall back to the filename order too, so the result never depends on the
/// order records were listed in.
pub fn sort_chronologically(mut records: Vec<ImageRecord>) -> Vec<String> {
    records.sort_by(compare_records);
    records.into_iter().map(|r| r.filename).collect()
}

pub fn compare_records(a: &ImageRecord, b: &ImageRecord) -> Ordering {
    match (&a.captured_at, &b.captured_at) {
        (Some(ta), Some(tb)) => ta
            .cmp(tb)
            .then_with(|| natural_cmp(&a.filename, &b.filename)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => natural_cmp(&a.filename, &b.filename),
    }
}

/// Filename comparison where digit runs compare by value ("img2" < "img10")
/// and letters compare case-insensitively. Ties are broken by the exact text
/// so distinct names never compare equal.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);

    for (l, r) in left.iter().zip(right.iter()) {
        let ord = match (l, r) {
            (Chunk::Digits(x), Chunk::Digits(y)) => cmp_digits(x, y),
            (Chunk::Text(x), Chunk::Text(y)) => cmp_text(x, y),
            (Chunk::Digits(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Digits(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    left.len()
        .cmp(&right.len())
        .then_with(|| leading_zero_cmp(&left, &right))
        .then_with(|| a.cmp(b))
}

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

fn chunks(input: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut in_digits: Option<bool> = None;

    for (idx, ch) in input.char_indices() {
        let is_digit = ch.is_ascii_digit();
        match in_digits {
            Some(prev) if prev != is_digit => {
                out.push(make_chunk(&input[start..idx], prev));
                start = idx;
            }
            _ => {}
        }
        in_digits = Some(is_digit);
    }
    if let Some(prev) = in_digits {
        out.push(make_chunk(&input[start..], prev));
    }
    out
}

fn make_chunk(text: &str, digits: bool) -> Chunk<'_> {
    if digits {
        Chunk::Digits(text)
    } else {
        Chunk::Text(text)
    }
}

fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn cmp_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

// "img01" and "img1" are numerically equal; the one with fewer zeros goes first.
fn leading_zero_cmp(left: &[Chunk<'_>], right: &[Chunk<'_>]) -> Ordering {
    for (l, r) in left.iter().zip(right.iter()) {
        if let (Chunk::Digits(x), Chunk::Digits(y)) = (l, r) {
            let ord = x.len().cmp(&y.len());
            if ord != Ordering::Equal {
                return ord;
            }
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32) -> Option<chrono::NaiveDateTime> {
        NaiveDate::from_ymd_opt(2024, 3, day).and_then(|d| d.and_hms_opt(12, 0, 0))
    }

    #[test]
    fn dated_before_undated_regardless_of_input_order() {
        let a = ImageRecord::new("a.jpg", at(1));
        let b = ImageRecord::new("b.jpg", at(2));
        let c = ImageRecord::new("z.jpg", None);

        let orders = [
            vec![a.clone(), b.clone(), c.clone()],
            vec![c.clone(), b.clone(), a.clone()],
            vec![b.clone(), c.clone(), a.clone()],
            vec![c.clone(), a.clone(), b.clone()],
        ];
        for input in orders {
            assert_eq!(sort_chronologically(input), vec!["a.jpg", "b.jpg", "z.jpg"]);
        }
    }

    #[test]
    fn earlier_capture_wins_over_filename() {
        let sorted = sort_chronologically(vec![
            ImageRecord::new("a.jpg", at(9)),
            ImageRecord::new("b.jpg", at(3)),
        ]);
        assert_eq!(sorted, vec!["b.jpg", "a.jpg"]);
    }

    #[test]
    fn undated_files_sort_numerically() {
        let sorted = sort_chronologically(vec![
            ImageRecord::new("img10.jpg", None),
            ImageRecord::new("img2.jpg", None),
            ImageRecord::new("img1.jpg", None),
        ]);
        assert_eq!(sorted, vec!["img1.jpg", "img2.jpg", "img10.jpg"]);
    }

    #[test]
    fn equal_timestamps_are_reproducible() {
        let first = sort_chronologically(vec![
            ImageRecord::new("DSC_0010.jpg", at(5)),
            ImageRecord::new("DSC_0009.jpg", at(5)),
        ]);
        let second = sort_chronologically(vec![
            ImageRecord::new("DSC_0009.jpg", at(5)),
            ImageRecord::new("DSC_0010.jpg", at(5)),
        ]);
        assert_eq!(first, second);
        assert_eq!(first, vec!["DSC_0009.jpg", "DSC_0010.jpg"]);
    }

    #[test]
    fn natural_cmp_is_case_insensitive_with_exact_tiebreak() {
        assert_eq!(natural_cmp("Beach.jpg", "apple.jpg"), Ordering::Greater);
        assert_eq!(natural_cmp("a.jpg", "A.jpg"), "a.jpg".cmp("A.jpg"));
        assert_eq!(natural_cmp("img1.jpg", "img01.jpg"), Ordering::Less);
        assert_eq!(natural_cmp("2.jpg", "a.jpg"), Ordering::Less);
        assert_eq!(natural_cmp("same.jpg", "same.jpg"), Ordering::Equal);
    }
}
