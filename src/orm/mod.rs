//! SeaORM entities, one module per table.

pub mod clubs;
pub mod direct_messages;
pub mod events;
pub mod forum_categories;
pub mod forum_comments;
pub mod forum_posts;
pub mod forum_votes;
pub mod platform_scores;
pub mod projects;
pub mod registrations;
pub mod sessions;
pub mod student_chapters;
pub mod team_invites;
pub mod team_join_requests;
pub mod team_members;
pub mod team_messages;
pub mod teams;
pub mod users;

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{sea_query::ColumnType, ColumnTrait};

    #[test]
    fn test_enum_columns_are_bounded_strings() {
        assert_eq!(
            forum_votes::Column::VoteType.def().get_column_type(),
            &ColumnType::String(Some(10))
        );
        assert_eq!(
            platform_scores::Column::Platform.def().get_column_type(),
            &ColumnType::String(Some(20))
        );
        assert_eq!(
            team_join_requests::Column::Status.def().get_column_type(),
            &ColumnType::String(Some(20))
        );
    }
}
