use std::collections::HashMap;

use crate::config::Target;

/// Which targets each chat user may see, in config order.
#[derive(Debug, Default, Clone)]
pub struct AccessMap {
    by_user: HashMap<i64, Vec<String>>,
}

impl AccessMap {
    pub fn from_targets(targets: &[Target]) -> Self {
        let mut by_user: HashMap<i64, Vec<String>> = HashMap::new();
        for target in targets {
            for &user in &target.members {
                let visible = by_user.entry(user).or_default();
                if !visible.contains(&target.name) {
                    visible.push(target.name.clone());
                }
            }
        }
        Self { by_user }
    }

    /// `None` when the user may see nothing.
    pub fn visible_to(&self, user: i64) -> Option<&[String]> {
        self.by_user
            .get(&user)
            .filter(|names| !names.is_empty())
            .map(Vec::as_slice)
    }
}
