/// Restricts which entries the differ visits, one level of the tree at a time.
///
/// Level `n` lists the names allowed at depth `n`. An empty filter allows
/// everything; so does any level past the last-but-one once the walk has
/// descended that far.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathFilter {
    levels: Vec<Vec<String>>,
}

impl PathFilter {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn new(levels: Vec<Vec<String>>) -> Self {
        Self { levels }
    }

    /// Filter for `base/<one of leaves>`.
    pub fn under(base: &[String], leaves: &[&str]) -> Self {
        let mut levels: Vec<Vec<String>> = base.iter().map(|p| vec![p.clone()]).collect();
        levels.push(leaves.iter().map(|s| s.to_string()).collect());
        Self { levels }
    }

    pub fn allows(&self, name: &str) -> bool {
        self.levels
            .first()
            .map_or(true, |allowed| allowed.iter().any(|a| a == name))
    }

    /// The filter for the level below.
    pub fn descend(&self) -> Self {
        if self.levels.len() < 2 {
            return Self::allow_all();
        }
        Self {
            levels: self.levels[1..].to_vec(),
        }
    }
}
