//! Integration tests for the entity store

use async_trait::async_trait;
use core_library::db::DatabaseConfig;
use core_library::models::{AutoSyncFrequency, Settings, SyncStrategy, Tab, TabType};
use core_library::repositories::Page;
use core_library::search::{
    FallbackSearch, SearchField, SearchStrategy, SubstringSearch, TabQuery, TabSortKey,
};
use core_library::{EntityStore, LibraryError, Result};
use sqlx::SqlitePool;
use std::path::PathBuf;

fn create_test_tab(title: &str, artist: &str, path: &str) -> Tab {
    let mut tab = Tab::new(title, path, 1_700_000_000);
    tab.artist = artist.to_string();
    tab.tab_type = TabType::Tablature;
    tab
}

async fn seed_songs(store: &EntityStore) -> (Tab, Tab, Tab) {
    let wonderwall = create_test_tab("Wonderwall", "Oasis", "/music/oasis/wonderwall.gp5");
    let creep = create_test_tab("Creep", "Radiohead", "/music/radiohead/creep.gp5");
    let medley = create_test_tab("AC/DC Medley", "Various", "/music/various/medley.pdf");

    store.add_tab(&wonderwall).await.unwrap();
    store.add_tab(&creep).await.unwrap();
    store.add_tab(&medley).await.unwrap();

    (wonderwall, creep, medley)
}

async fn association_count(pool: &SqlitePool, tab_id: &str) -> i64 {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tab_categories WHERE tab_id = ?")
        .bind(tab_id)
        .fetch_one(pool)
        .await
        .unwrap();
    count.0
}

#[tokio::test]
async fn test_add_and_get_round_trip() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let rock = store.create_category("Rock", None).await.unwrap();
    let live = store.create_category("Live", None).await.unwrap();

    let mut tab = create_test_tab("Wonderwall", "Oasis", "/music/wonderwall.gp5");
    tab.album = "(What's the Story) Morning Glory?".to_string();
    tab.country = "GB".to_string();
    tab.language = "en".to_string();
    tab.tag = "acoustic".to_string();
    tab.category_ids = vec![live.id.clone(), rock.id.clone()];

    store.add_tab(&tab).await.unwrap();

    let loaded = store.get_tab(&tab.id).await.unwrap().unwrap();
    assert_eq!(loaded, tab);
    assert_eq!(loaded.primary_category(), Some(live.id.as_str()));

    let by_path = store.get_tab_by_path(&tab.file_path).await.unwrap().unwrap();
    assert_eq!(by_path.id, tab.id);
    let by_title = store.get_tab_by_title("Wonderwall").await.unwrap().unwrap();
    assert_eq!(by_title.id, tab.id);
    assert!(store.get_tab_by_title("wonderwall ").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_replaces_associations() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let rock = store.create_category("Rock", None).await.unwrap();
    let pop = store.create_category("Pop", None).await.unwrap();

    let mut tab = create_test_tab("Creep", "Radiohead", "/music/creep.gp5");
    tab.category_ids = vec![rock.id.clone()];
    store.add_tab(&tab).await.unwrap();

    tab.title = "Creep (Acoustic)".to_string();
    tab.category_ids = vec![pop.id.clone()];
    store.update_tab(&tab).await.unwrap();

    let loaded = store.get_tab(&tab.id).await.unwrap().unwrap();
    assert_eq!(loaded.title, "Creep (Acoustic)");
    assert_eq!(loaded.category_ids, vec![pop.id.clone()]);
    assert_eq!(store.tab_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_delete_removes_associations() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let rock = store.create_category("Rock", None).await.unwrap();

    let mut tab = create_test_tab("Creep", "Radiohead", "/music/creep.gp5");
    tab.category_ids = vec![rock.id.clone()];
    store.add_tab(&tab).await.unwrap();
    assert_eq!(association_count(store.pool(), &tab.id).await, 1);

    assert!(store.delete_tab(&tab.id).await.unwrap());
    assert!(store.get_tab(&tab.id).await.unwrap().is_none());
    assert_eq!(association_count(store.pool(), &tab.id).await, 0);

    // The category itself survives
    assert!(store.get_category(&rock.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_duplicate_live_path_rejected() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let first = create_test_tab("One", "", "/music/same.pdf");
    let second = create_test_tab("Two", "", "/music/same.pdf");

    store.add_tab(&first).await.unwrap();
    let err = store.add_tab(&second).await.unwrap_err();
    assert!(matches!(err, LibraryError::InvalidInput { ref field, .. } if field == "file_path"));

    // Once the first entry is gone the path may be reused
    store.delete_tab(&first.id).await.unwrap();
    store.add_tab(&second).await.unwrap();
}

#[tokio::test]
async fn test_search_prefix_match() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let (wonderwall, _, _) = seed_songs(&store).await;

    let page = store
        .get_tabs_paginated(&TabQuery::new().search("wonder", &[]))
        .await
        .unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, wonderwall.id);
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_search_respects_fields() {
    let store = EntityStore::open_in_memory().await.unwrap();
    seed_songs(&store).await;

    let by_artist = store
        .get_tabs_paginated(&TabQuery::new().search("radio", &[SearchField::Artist]))
        .await
        .unwrap();
    assert_eq!(by_artist.total, 1);
    assert_eq!(by_artist.items[0].title, "Creep");

    let title_only = store
        .get_tabs_paginated(&TabQuery::new().search("radio", &[SearchField::Title]))
        .await
        .unwrap();
    assert_eq!(title_only.total, 0);
}

#[tokio::test]
async fn test_search_ignores_diacritics() {
    let store = EntityStore::open_in_memory().await.unwrap();
    store
        .add_tab(&create_test_tab("Café del Mar", "Energy 52", "/music/cafe.pdf"))
        .await
        .unwrap();

    let page = store
        .get_tabs_paginated(&TabQuery::new().search("cafe", &[]))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_search_falls_back_to_substring() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let (_, _, medley) = seed_songs(&store).await;

    // Nothing indexable in "/", so the index rejects it
    let page = store
        .get_tabs_paginated(&TabQuery::new().search("/", &[]))
        .await
        .unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, medley.id);
}

struct BrokenIndex;

#[async_trait]
impl SearchStrategy for BrokenIndex {
    fn name(&self) -> &'static str {
        "broken"
    }

    async fn search(&self, _pool: &SqlitePool, _query: &TabQuery) -> Result<Page<Tab>> {
        Err(LibraryError::SearchIndex("fts5: syntax error".to_string()))
    }
}

#[tokio::test]
async fn test_index_error_never_reaches_caller() {
    let store = EntityStore::open_in_memory()
        .await
        .unwrap()
        .with_search_strategy(Box::new(FallbackSearch::new(
            Box::new(BrokenIndex),
            Box::new(SubstringSearch),
        )));
    seed_songs(&store).await;

    let page = store
        .get_tabs_paginated(&TabQuery::new().search("wall", &[SearchField::Title]))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].title, "Wonderwall");
}

#[tokio::test]
async fn test_substring_search_escapes_wildcards() {
    let store = EntityStore::open_in_memory().await.unwrap();
    store
        .add_tab(&create_test_tab("100% Pure", "", "/music/pure.txt"))
        .await
        .unwrap();
    store
        .add_tab(&create_test_tab("1000 Miles", "", "/music/miles.txt"))
        .await
        .unwrap();

    let page = store
        .get_tabs_paginated(&TabQuery::new().search("%", &[]))
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].title, "100% Pure");
}

#[tokio::test]
async fn test_category_scope_and_global_flag() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let rock = store.create_category("Rock", None).await.unwrap();
    let (wonderwall, creep, _) = seed_songs(&store).await;

    store
        .set_tab_categories(&wonderwall.id, &[rock.id.clone()], 100)
        .await
        .unwrap();

    let scoped = store
        .get_tabs_paginated(&TabQuery::new().in_category(&rock.id))
        .await
        .unwrap();
    assert_eq!(scoped.total, 1);
    assert_eq!(scoped.items[0].id, wonderwall.id);

    let scoped_search = store
        .get_tabs_paginated(&TabQuery::new().in_category(&rock.id).search("creep", &[]))
        .await
        .unwrap();
    assert_eq!(scoped_search.total, 0);

    let global_search = store
        .get_tabs_paginated(
            &TabQuery::new()
                .in_category(&rock.id)
                .search("creep", &[])
                .global(true),
        )
        .await
        .unwrap();
    assert_eq!(global_search.total, 1);
    assert_eq!(global_search.items[0].id, creep.id);

    let everything = store.get_tabs_paginated(&TabQuery::new()).await.unwrap();
    assert_eq!(everything.total, 3);
}

#[tokio::test]
async fn test_pagination_and_sorting() {
    let store = EntityStore::open_in_memory().await.unwrap();
    for (index, title) in ["Echo", "Alpha", "Delta", "Bravo", "Charlie"].iter().enumerate() {
        let mut tab = create_test_tab(title, "", &format!("/music/{}.txt", title));
        tab.added_at = 1_000 + index as i64;
        store.add_tab(&tab).await.unwrap();
    }

    let first = store
        .get_tabs_paginated(&TabQuery::new().page(1, 2))
        .await
        .unwrap();
    let titles: Vec<&str> = first.items.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Alpha", "Bravo"]);
    assert_eq!(first.total, 5);
    assert_eq!(first.total_pages, 3);
    assert!(first.has_more);

    let last = store
        .get_tabs_paginated(&TabQuery::new().page(3, 2))
        .await
        .unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].title, "Echo");
    assert!(!last.has_more);

    // Page 0 is treated as the first page
    let zero = store
        .get_tabs_paginated(&TabQuery::new().page(0, 2))
        .await
        .unwrap();
    assert_eq!(zero.page, 1);
    assert_eq!(zero.items[0].title, "Alpha");

    let newest = store
        .get_tabs_paginated(&TabQuery::new().page(1, 1).sort(TabSortKey::AddedAt, true))
        .await
        .unwrap();
    assert_eq!(newest.items[0].title, "Charlie");
}

#[tokio::test]
async fn test_far_page_is_empty() {
    let store = EntityStore::open_in_memory().await.unwrap();
    seed_songs(&store).await;

    let far = store
        .get_tabs_paginated(&TabQuery::new().page(10_000_000, 500))
        .await
        .unwrap();
    assert!(far.items.is_empty());
    assert_eq!(far.total, 3);
    assert_eq!(far.page, 10_000_000);
    assert!(!far.has_more);

    let far_search = store
        .get_tabs_paginated(&TabQuery::new().page(u32::MAX, 500).search("a", &[]))
        .await
        .unwrap();
    assert!(far_search.items.is_empty());
    assert!(!far_search.has_more);
}

#[tokio::test]
async fn test_deserialized_query_page_is_clamped() {
    let store = EntityStore::open_in_memory().await.unwrap();
    seed_songs(&store).await;

    let query: TabQuery = serde_json::from_str(
        r#"{"page":{"page":0,"page_size":100000},"search":"","fields":[],"isGlobal":false,"sortDesc":false}"#,
    )
    .unwrap();
    assert_eq!(query.page.page, 1);
    assert_eq!(query.page.page_size, 500);

    let page = store.get_tabs_paginated(&query).await.unwrap();
    assert_eq!(page.items.len(), 3);
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_set_tab_categories_orders_by_association_time() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let setlist = store.create_category("Setlist", None).await.unwrap();
    let (wonderwall, creep, medley) = seed_songs(&store).await;

    store
        .set_tab_categories(&creep.id, &[setlist.id.clone()], 10)
        .await
        .unwrap();
    store
        .set_tab_categories(&medley.id, &[setlist.id.clone()], 20)
        .await
        .unwrap();
    store
        .set_tab_categories(&wonderwall.id, &[setlist.id.clone(), setlist.id.clone()], 30)
        .await
        .unwrap();

    let page = store
        .get_tabs_paginated(
            &TabQuery::new()
                .in_category(&setlist.id)
                .sort(TabSortKey::CategoryAddedAt, false),
        )
        .await
        .unwrap();
    let ids: Vec<&str> = page.items.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec![creep.id.as_str(), medley.id.as_str(), wonderwall.id.as_str()]);
    assert_eq!(page.items[2].category_ids, vec![setlist.id.clone()]);

    let err = store
        .set_tab_categories("missing", &[setlist.id.clone()], 40)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_category_promotes_children_and_keeps_tabs() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let parent = store.create_category("Guitar", None).await.unwrap();
    let child = store.create_category("Fingerstyle", Some(&parent.id)).await.unwrap();
    let other = store.create_category("Favourites", None).await.unwrap();

    let (wonderwall, _, _) = seed_songs(&store).await;
    store
        .set_tab_categories(&wonderwall.id, &[parent.id.clone(), other.id.clone()], 5)
        .await
        .unwrap();

    assert!(store.delete_category(&parent.id).await.unwrap());

    let promoted = store.get_category(&child.id).await.unwrap().unwrap();
    assert!(promoted.is_root());

    let tab = store.get_tab(&wonderwall.id).await.unwrap().unwrap();
    assert_eq!(tab.category_ids, vec![other.id.clone()]);
    assert_eq!(tab.primary_category(), Some(other.id.as_str()));
    assert_eq!(store.tab_count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_move_category_rejects_cycles() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let a = store.create_category("A", None).await.unwrap();
    let b = store.create_category("B", Some(&a.id)).await.unwrap();
    let c = store.create_category("C", Some(&b.id)).await.unwrap();

    let err = store.move_category(&a.id, Some(&c.id)).await.unwrap_err();
    assert!(matches!(err, LibraryError::InvalidInput { .. }));

    let err = store.move_category(&a.id, Some(&a.id)).await.unwrap_err();
    assert!(matches!(err, LibraryError::InvalidInput { .. }));

    let err = store.move_category(&a.id, Some("missing")).await.unwrap_err();
    assert!(err.is_not_found());

    // Legal moves still work
    store.move_category(&c.id, None).await.unwrap();
    store.move_category(&a.id, Some(&c.id)).await.unwrap();
    let moved = store.get_category(&a.id).await.unwrap().unwrap();
    assert_eq!(moved.parent_id.as_deref(), Some(c.id.as_str()));

    let roots = store.child_categories(None).await.unwrap();
    let root_ids: Vec<&str> = roots.iter().map(|cat| cat.id.as_str()).collect();
    assert_eq!(root_ids, vec![c.id.as_str()]);
}

#[tokio::test]
async fn test_category_effective_cover() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let category = store.create_category("Covers", None).await.unwrap();

    let bare = create_test_tab("Bare", "", "/music/bare.txt");
    let mut early = create_test_tab("Early", "", "/music/early.txt");
    early.cover_path = Some("/covers/early.jpg".to_string());
    let mut late = create_test_tab("Late", "", "/music/late.txt");
    late.cover_path = Some("/covers/late.jpg".to_string());

    for tab in [&bare, &early, &late] {
        store.add_tab(tab).await.unwrap();
    }
    store.set_tab_categories(&late.id, &[category.id.clone()], 300).await.unwrap();
    store.set_tab_categories(&bare.id, &[category.id.clone()], 100).await.unwrap();
    store.set_tab_categories(&early.id, &[category.id.clone()], 200).await.unwrap();

    let loaded = store.get_category(&category.id).await.unwrap().unwrap();
    assert_eq!(loaded.cover_path, None);
    assert_eq!(loaded.effective_cover_path.as_deref(), Some("/covers/early.jpg"));

    store
        .set_category_cover(&category.id, Some("/covers/custom.png"))
        .await
        .unwrap();
    let loaded = store.get_category(&category.id).await.unwrap().unwrap();
    assert_eq!(loaded.effective_cover_path.as_deref(), Some("/covers/custom.png"));

    let empty = store.create_category("Empty", None).await.unwrap();
    assert_eq!(empty.effective_cover_path, None);
}

#[tokio::test]
async fn test_rename_and_list_categories() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let b = store.create_category("beta", None).await.unwrap();
    store.create_category("Alpha", None).await.unwrap();

    store.rename_category(&b.id, "Gamma").await.unwrap();
    let names: Vec<String> = store
        .list_categories()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Alpha".to_string(), "Gamma".to_string()]);

    let err = store.rename_category(&b.id, "  ").await.unwrap_err();
    assert!(matches!(err, LibraryError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_cover_and_last_opened_updates() {
    let store = EntityStore::open_in_memory().await.unwrap();
    let (wonderwall, _, _) = seed_songs(&store).await;

    let updated = store
        .set_tab_cover(&wonderwall.id, Some("/covers/w.jpg"))
        .await
        .unwrap();
    assert!(updated.has_cover());

    store.touch_last_opened(&wonderwall.id, 1_800_000_000).await.unwrap();
    let page = store
        .get_tabs_paginated(&TabQuery::new().page(1, 1).sort(TabSortKey::LastOpened, true))
        .await
        .unwrap();
    assert_eq!(page.items[0].id, wonderwall.id);
    assert_eq!(page.items[0].last_opened, Some(1_800_000_000));
}

#[tokio::test]
async fn test_settings_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("library.db");

    let settings = Settings {
        sync_paths: vec![PathBuf::from("/music/tabs"), PathBuf::from("/music/sheets")],
        sync_strategy: SyncStrategy::Overwrite,
        auto_sync_enabled: false,
        auto_sync_frequency: AutoSyncFrequency::Weekly,
        last_sync_time: Some(1_700_000_000),
    };

    {
        let store = EntityStore::initialize(DatabaseConfig::new(&db_path))
            .await
            .unwrap();
        store.update_settings(&settings).await.unwrap();
        assert_eq!(store.settings(), settings);
        store.close().await;
    }

    let reopened = EntityStore::initialize(DatabaseConfig::new(&db_path))
        .await
        .unwrap();
    assert_eq!(reopened.settings(), settings);
}

#[tokio::test]
async fn test_delete_managed_tab_removes_files() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("managed.pdf");
    let cover = dir.path().join("managed.jpg");
    std::fs::write(&file, b"%PDF-1.4").unwrap();
    std::fs::write(&cover, b"jpeg").unwrap();

    let linked_file = dir.path().join("linked.pdf");
    std::fs::write(&linked_file, b"%PDF-1.4").unwrap();

    let store = EntityStore::open_in_memory().await.unwrap();

    let mut managed = create_test_tab("Managed", "", &file.to_string_lossy());
    managed.is_managed = true;
    managed.cover_path = Some(cover.to_string_lossy().into_owned());
    store.add_tab(&managed).await.unwrap();

    let linked = create_test_tab("Linked", "", &linked_file.to_string_lossy());
    store.add_tab(&linked).await.unwrap();

    assert!(store.delete_tab(&managed.id).await.unwrap());
    assert!(store.delete_tab(&linked.id).await.unwrap());

    assert!(!file.exists());
    assert!(!cover.exists());
    assert!(linked_file.exists());
}

#[tokio::test]
async fn test_concurrent_access_from_tasks() {
    let store = std::sync::Arc::new(EntityStore::open_in_memory().await.unwrap());

    let handles: Vec<_> = (0..10)
        .map(|index| {
            let store = store.clone();
            tokio::spawn(async move {
                let tab = create_test_tab(
                    &format!("Song {}", index),
                    "",
                    &format!("/music/{}.txt", index),
                );
                store.add_tab(&tab).await.unwrap();
                store.get_tabs_paginated(&TabQuery::new()).await.unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.tab_count().await.unwrap(), 10);
}
