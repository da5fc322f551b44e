use serde::Serialize;

use super::{AudioRow, Page, PlaylistSummary, UserSummary, join_owners, resolve_users};
use crate::error::{Error, Result};
use crate::store::Store;
use crate::types::Visibility;

#[derive(Debug, Clone, Serialize)]
pub struct PublicProfile {
    pub id: String,
    pub name: String,
    pub followers: usize,
    pub followings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

pub fn public_profile(store: &dyn Store, profile_id: &str) -> Result<PublicProfile> {
    let user = store.get_user(profile_id)?.ok_or(Error::NotFound)?;
    Ok(PublicProfile {
        followers: store.list_followers(&user.id)?.len(),
        followings: store.list_followings(&user.id)?.len(),
        avatar: user.avatar.map(|a| a.url),
        id: user.id,
        name: user.name,
    })
}

/// Followers in storage order. The id list is sliced to the page before lookup,
/// so pages can come back short when followers have been removed.
pub fn followers(store: &dyn Store, user_id: &str, page: Page) -> Result<Vec<UserSummary>> {
    let ids = store.list_followers(user_id)?;
    let users = resolve_users(store, page.slice(&ids))?;
    Ok(users.into_iter().map(UserSummary::from).collect())
}

pub fn followings(store: &dyn Store, user_id: &str, page: Page) -> Result<Vec<UserSummary>> {
    let ids = store.list_followings(user_id)?;
    let users = resolve_users(store, page.slice(&ids))?;
    Ok(users.into_iter().map(UserSummary::from).collect())
}

pub fn is_following(store: &dyn Store, user_id: &str, profile_id: &str) -> Result<bool> {
    Ok(store
        .list_followings(user_id)?
        .iter()
        .any(|id| id == profile_id))
}

/// A profile's public playlists, newest first.
pub fn public_playlists(
    store: &dyn Store,
    profile_id: &str,
    page: Page,
) -> Result<Vec<PlaylistSummary>> {
    let playlists: Vec<PlaylistSummary> = store
        .list_playlists_by_owner(profile_id)?
        .into_iter()
        .filter(|p| p.visibility == Visibility::Public)
        .map(|p| PlaylistSummary {
            item_count: p.items.len(),
            id: p.id,
            title: p.title,
        })
        .collect();
    Ok(page.window(playlists))
}

/// Audio uploaded by `owner_id`, newest first.
pub fn owner_audios(store: &dyn Store, owner_id: &str, page: Page) -> Result<Vec<AudioRow>> {
    let audios = page.window(store.list_audios_by_owner(owner_id)?);
    join_owners(store, audios)
}

pub fn latest_uploads(store: &dyn Store, limit: usize) -> Result<Vec<AudioRow>> {
    join_owners(store, store.list_latest_audios(limit)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures;
    use crate::types::Category;

    #[test]
    fn test_followers_sliced_in_storage_order() {
        let store = fixtures::store();
        let star = fixtures::user(&store, "star");
        let fans: Vec<_> = (0..5)
            .map(|i| fixtures::user(&store, &format!("fan{i}")))
            .collect();
        for fan in &fans {
            store.follow(&fan.id, &star.id).unwrap();
        }

        let second_page = followers(&store, &star.id, Page { limit: 2, number: 1 }).unwrap();
        let names: Vec<_> = second_page.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["fan2", "fan3"]);

        let following = followings(&store, &fans[0].id, Page::default()).unwrap();
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].id, star.id);
        assert!(is_following(&store, &fans[0].id, &star.id).unwrap());
        assert!(!is_following(&store, &star.id, &fans[0].id).unwrap());
    }

    #[test]
    fn test_public_profile_counts() {
        let store = fixtures::store();
        let a = fixtures::user(&store, "a");
        let b = fixtures::user(&store, "b");
        store.follow(&b.id, &a.id).unwrap();

        let profile = public_profile(&store, &a.id).unwrap();
        assert_eq!(profile.followers, 1);
        assert_eq!(profile.followings, 0);
        assert!(matches!(
            public_profile(&store, "nobody"),
            Err(Error::NotFound)
        ));
    }

    #[test]
    fn test_public_playlists_hide_private_and_auto() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        fixtures::playlist(&store, &owner.id, "Open", Visibility::Public, &[]);
        fixtures::playlist(&store, &owner.id, "Secret", Visibility::Private, &[]);
        store.upsert_mixed_playlist(&owner.id, &["x".to_string()]).unwrap();

        let playlists = public_playlists(&store, &owner.id, Page::default()).unwrap();
        assert_eq!(playlists.len(), 1);
        assert_eq!(playlists[0].title, "Open");
    }

    #[test]
    fn test_owner_audios_and_latest_uploads_newest_first() {
        let store = fixtures::store();
        let owner = fixtures::user(&store, "owner");
        let other = fixtures::user(&store, "other");
        let first = fixtures::audio(&store, &owner.id, "First", Category::Arts, 1.0);
        let second = fixtures::audio(&store, &owner.id, "Second", Category::Arts, 1.0);
        let third = fixtures::audio(&store, &other.id, "Third", Category::Arts, 1.0);

        let mine = owner_audios(&store, &owner.id, Page::default()).unwrap();
        let ids: Vec<_> = mine.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![second.id.clone(), first.id]);

        let latest = latest_uploads(&store, 2).unwrap();
        let ids: Vec<_> = latest.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![third.id, second.id]);
    }
}
