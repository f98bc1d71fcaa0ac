use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitKind {
    Train,
    Valid,
    Test,
}

impl SplitKind {
    pub const ALL: [SplitKind; 3] = [SplitKind::Train, SplitKind::Valid, SplitKind::Test];

    /// File stem used by the corpus and the artifact store.
    pub fn file_name(&self) -> &'static str {
        match self {
            SplitKind::Train => "trainset.json",
            SplitKind::Valid => "validset.json",
            SplitKind::Test  => "testset.json",
        }
    }
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitKind::Train => write!(f, "train"),
            SplitKind::Valid => write!(f, "valid"),
            SplitKind::Test  => write!(f, "test"),
        }
    }
}

impl FromStr for SplitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(SplitKind::Train),
            "valid" => Ok(SplitKind::Valid),
            "test"  => Ok(SplitKind::Test),
            other   => Err(format!("unknown split '{other}' (expected train, valid or test)")),
        }
    }
}

/// The three disjoint splits of a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Splits<T> {
    pub train: Vec<T>,
    pub valid: Vec<T>,
    pub test:  Vec<T>,
}

impl<T> Default for Splits<T> {
    fn default() -> Self {
        Self { train: Vec::new(), valid: Vec::new(), test: Vec::new() }
    }
}

impl<T> Splits<T> {
    pub fn new(train: Vec<T>, valid: Vec<T>, test: Vec<T>) -> Self {
        Self { train, valid, test }
    }

    pub fn get(&self, kind: SplitKind) -> &[T] {
        match kind {
            SplitKind::Train => &self.train,
            SplitKind::Valid => &self.valid,
            SplitKind::Test  => &self.test,
        }
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.valid.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every item in train → valid → test order, tagged with its split.
    pub fn iter(&self) -> impl Iterator<Item = (SplitKind, &T)> {
        SplitKind::ALL
            .into_iter()
            .flat_map(move |kind| self.get(kind).iter().map(move |item| (kind, item)))
    }

    /// Transform each split as a whole, stopping at the first error.
    pub fn try_map<U, E>(
        self,
        mut f: impl FnMut(SplitKind, Vec<T>) -> Result<Vec<U>, E>,
    ) -> Result<Splits<U>, E> {
        Ok(Splits {
            train: f(SplitKind::Train, self.train)?,
            valid: f(SplitKind::Valid, self.valid)?,
            test:  f(SplitKind::Test, self.test)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iter_visits_splits_in_order() {
        let s = Splits::new(vec![1, 2], vec![3], vec![4]);
        let seen: Vec<(SplitKind, i32)> = s.iter().map(|(k, v)| (k, *v)).collect();
        assert_eq!(
            seen,
            vec![
                (SplitKind::Train, 1),
                (SplitKind::Train, 2),
                (SplitKind::Valid, 3),
                (SplitKind::Test, 4),
            ]
        );
        assert_eq!(s.len(), 4);
    }

    #[test]
    fn test_try_map_stops_on_error() {
        let s = Splits::new(vec![1], vec![2], vec![3]);
        let out: Result<Splits<i32>, String> = s.try_map(|kind, v| {
            if kind == SplitKind::Valid {
                Err("bad valid".to_string())
            } else {
                Ok(v)
            }
        });
        assert_eq!(out.unwrap_err(), "bad valid");
    }

    #[test]
    fn test_split_kind_parses_its_display_name() {
        for kind in SplitKind::ALL {
            assert_eq!(kind.to_string().parse::<SplitKind>(), Ok(kind));
        }
        assert!("dev".parse::<SplitKind>().is_err());
    }
}
