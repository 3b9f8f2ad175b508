//! Per-user styling derived from the roster.

use std::collections::BTreeMap;

use super::{
    entity::Roster,
    value_object::{Color, TokenHash},
};

/// How one user's name and tripcode badge are drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStyle {
    pub name_color: Color,
    /// `(foreground, background)` of the tripcode badge
    pub tripcode_colors: Option<(Color, Color)>,
    pub broadcaster: bool,
}

/// Build the style mapping for every user in the roster.
///
/// The result depends only on the roster, so the presentation layer can
/// recompute it after any roster change instead of patching styles.
pub fn style_map(roster: &Roster) -> BTreeMap<TokenHash, UserStyle> {
    roster
        .iter()
        .map(|(token_hash, user)| {
            let style = UserStyle {
                name_color: user.color,
                tripcode_colors: user
                    .tripcode
                    .as_ref()
                    .map(|t| (t.foreground_color, t.background_color)),
                broadcaster: user.broadcaster,
            };
            (token_hash.clone(), style)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::{Tripcode, tests::user};

    #[test]
    fn test_style_map_follows_roster() {
        // テスト項目: スタイルはロスターから一意に決まり、削除されたユーザーは含まれない
        // given (前提条件):
        let alice = TokenHash::new("alice".to_string()).unwrap();
        let bob = TokenHash::new("bob".to_string()).unwrap();
        let mut with_trip = user("bob");
        with_trip.tripcode = Some(Tripcode {
            digest: "AbCdEfGh".to_string(),
            background_color: Color::from_rgb(0, 0, 0),
            foreground_color: Color::from_rgb(255, 255, 255),
        });
        let mut roster = Roster::default();
        roster.set_users([(alice.clone(), user("alice")), (bob.clone(), with_trip)]);

        // when (操作):
        roster.remove_users([&alice]);
        let styles = style_map(&roster);

        // then (期待する結果):
        assert_eq!(styles.len(), 1);
        let style = &styles[&bob];
        assert_eq!(style.name_color, Color::from_rgb(0x80, 0x80, 0x80));
        assert_eq!(
            style.tripcode_colors,
            Some((Color::from_rgb(255, 255, 255), Color::from_rgb(0, 0, 0)))
        );
    }
}
