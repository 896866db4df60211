//! Namespace descriptors for every entity.
//!
//! Each descriptor names the namespace, its key, the attributes free-text
//! search looks at, the default ordering and the declared indexes.

use haven_store::{EntitySchema, IndexDef, SortOrder};

/// User profiles.
pub const USERS: EntitySchema = EntitySchema {
    namespace: "users",
    key_attr: "id",
    searchable: &["name", "email"],
    default_sort: "createdAt",
    default_order: SortOrder::Desc,
    indexes: &[IndexDef::on("email")],
};

/// Counselors.
pub const COUNSELORS: EntitySchema = EntitySchema {
    namespace: "counselors",
    key_attr: "id",
    searchable: &["name", "email", "specialization", "bio"],
    default_sort: "displayOrder",
    default_order: SortOrder::Asc,
    indexes: &[],
};

/// Bookings.
pub const BOOKINGS: EntitySchema = EntitySchema {
    namespace: "bookings",
    key_attr: "id",
    searchable: &["guestName", "guestEmail", "counselorName", "notes"],
    default_sort: "createdAt",
    default_order: SortOrder::Desc,
    indexes: &[
        IndexDef::on("counselorId"),
        IndexDef::on("userId"),
        IndexDef::on("status"),
    ],
};

/// Leads.
pub const LEADS: EntitySchema = EntitySchema {
    namespace: "leads",
    key_attr: "id",
    searchable: &["name", "email", "phone", "message"],
    default_sort: "createdAt",
    default_order: SortOrder::Desc,
    indexes: &[],
};

/// Lead activities.
pub const LEAD_ACTIVITIES: EntitySchema = EntitySchema {
    namespace: "lead_activities",
    key_attr: "id",
    searchable: &["description"],
    default_sort: "createdAt",
    default_order: SortOrder::Desc,
    indexes: &[IndexDef::on("leadId")],
};

/// Blog posts.
pub const BLOGS: EntitySchema = EntitySchema {
    namespace: "blogs",
    key_attr: "id",
    searchable: &["title", "excerpt", "content", "tags"],
    default_sort: "createdAt",
    default_order: SortOrder::Desc,
    indexes: &[IndexDef::on("slug"), IndexDef::on("authorId")],
};

/// Categories.
pub const CATEGORIES: EntitySchema = EntitySchema {
    namespace: "categories",
    key_attr: "id",
    searchable: &["name", "description"],
    default_sort: "name",
    default_order: SortOrder::Asc,
    indexes: &[IndexDef::on("slug")],
};

/// Testimonials.
pub const TESTIMONIALS: EntitySchema = EntitySchema {
    namespace: "testimonials",
    key_attr: "id",
    searchable: &["name", "message", "designation"],
    default_sort: "createdAt",
    default_order: SortOrder::Desc,
    indexes: &[IndexDef::on("userId")],
};

/// Videos.
pub const VIDEOS: EntitySchema = EntitySchema {
    namespace: "videos",
    key_attr: "id",
    searchable: &["title", "description", "tags"],
    default_sort: "createdAt",
    default_order: SortOrder::Desc,
    indexes: &[],
};

/// Reels.
pub const REELS: EntitySchema = EntitySchema {
    namespace: "reels",
    ..VIDEOS
};

/// Downloadable materials.
pub const MATERIALS: EntitySchema = EntitySchema {
    namespace: "materials",
    ..VIDEOS
};

/// Homepage banners.
pub const BANNERS: EntitySchema = EntitySchema {
    namespace: "banners",
    key_attr: "id",
    searchable: &["title", "description"],
    default_sort: "displayOrder",
    default_order: SortOrder::Asc,
    indexes: &[],
};

/// Team members.
pub const TEAM: EntitySchema = EntitySchema {
    namespace: "team",
    key_attr: "id",
    searchable: &["title", "name", "description"],
    default_sort: "displayOrder",
    default_order: SortOrder::Asc,
    indexes: &[],
};

/// Every namespace the platform stores, for opening the database.
pub const ALL: &[&EntitySchema] = &[
    &USERS,
    &COUNSELORS,
    &BOOKINGS,
    &LEADS,
    &LEAD_ACTIVITIES,
    &BLOGS,
    &CATEGORIES,
    &TESTIMONIALS,
    &VIDEOS,
    &REELS,
    &MATERIALS,
    &BANNERS,
    &TEAM,
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn namespaces_are_unique() {
        let names: HashSet<_> = ALL.iter().map(|s| s.namespace).collect();
        assert_eq!(names.len(), ALL.len());
    }

    #[test]
    fn default_sorts() {
        assert_eq!(COUNSELORS.default_sort, "displayOrder");
        assert_eq!(TEAM.default_order, SortOrder::Asc);
        assert_eq!(BOOKINGS.default_sort, "createdAt");
        assert_eq!(BOOKINGS.default_order, SortOrder::Desc);
        assert_eq!(REELS.searchable, VIDEOS.searchable);
    }
}
