//! Advertisement bookkeeping integration tests

mod common;

use std::time::Duration;

use chrono::Utc;
use common::*;
use food_roulette::{
    models::advertisement::{NewAdvertisement, StatsPeriod, UpdateAdvertisement},
    AppError,
};
use uuid::Uuid;

#[tokio::test]
async fn test_repeated_view_within_cooldown_counts_once() {
    let state = state();
    let services = &state.services;
    let restaurant = seed_restaurant(services, "Dumplings", 111.0).await;
    let ad = seed_ad(services, restaurant.id, 3).await;
    let session = Uuid::new_v4();

    assert!(services.advertisements.record_view(ad.id, 1, session).await.unwrap());
    assert!(!services.advertisements.record_view(ad.id, 1, session).await.unwrap());
    // Another user has their own window
    assert!(services.advertisements.record_view(ad.id, 2, session).await.unwrap());

    let ad = services.advertisements.get_ad(ad.id).await.unwrap();
    assert_eq!(ad.view_count, 2);

    let stats = services.advertisements.statistics(ad.id, "all").await.unwrap();
    assert_eq!(stats.view_count, 2);
    assert_eq!(stats.unique_viewers, 2);
}

#[tokio::test(start_paused = true)]
async fn test_click_counts_again_after_cooldown() {
    let state = state();
    let services = &state.services;
    let restaurant = seed_restaurant(services, "Dumplings", 111.0).await;
    let ad = seed_ad(services, restaurant.id, 3).await;
    let session = Uuid::new_v4();

    assert!(services.advertisements.record_click(ad.id, 1, session).await.unwrap());
    assert!(!services.advertisements.record_click(ad.id, 1, session).await.unwrap());

    // Still inside the click window even though a view would have reopened
    tokio::time::advance(Duration::from_secs(45)).await;
    assert!(!services.advertisements.record_click(ad.id, 1, session).await.unwrap());

    tokio::time::advance(Duration::from_secs(20)).await;
    assert!(services.advertisements.record_click(ad.id, 1, session).await.unwrap());

    let ad = services.advertisements.get_ad(ad.id).await.unwrap();
    assert_eq!(ad.click_count, 2);
}

#[tokio::test]
async fn test_click_through_rate() {
    let state = state();
    let services = &state.services;
    let restaurant = seed_restaurant(services, "Dumplings", 111.0).await;
    let ad = seed_ad(services, restaurant.id, 3).await;
    let session = Uuid::new_v4();

    for user in 1..=10 {
        services.advertisements.record_view(ad.id, user, session).await.unwrap();
    }
    for user in 1..=2 {
        services.advertisements.record_click(ad.id, user, session).await.unwrap();
    }

    for period in ["day", "week", "month", "all"] {
        let stats = services.advertisements.statistics(ad.id, period).await.unwrap();
        assert_eq!(stats.view_count, 10);
        assert_eq!(stats.click_count, 2);
        assert_eq!(stats.unique_clickers, 2);
        assert_eq!(stats.ctr, 20.0);
        assert_eq!(stats.period.as_str(), period);
    }
}

#[tokio::test]
async fn test_statistics_without_views() {
    let state = state();
    let services = &state.services;
    let restaurant = seed_restaurant(services, "Dumplings", 111.0).await;
    let ad = seed_ad(services, restaurant.id, 3).await;

    let stats = services.advertisements.statistics(ad.id, "week").await.unwrap();
    assert_eq!(stats.view_count, 0);
    assert_eq!(stats.ctr, 0.0);
    assert_eq!(stats.period, StatsPeriod::Week);
}

#[tokio::test]
async fn test_statistics_rejects_bad_period_and_unknown_ad() {
    let state = state();
    let services = &state.services;
    let restaurant = seed_restaurant(services, "Dumplings", 111.0).await;
    let ad = seed_ad(services, restaurant.id, 3).await;

    assert!(matches!(
        services.advertisements.statistics(ad.id, "year").await,
        Err(AppError::InvalidPeriod(_))
    ));
    assert!(matches!(
        services.advertisements.statistics(9_999, "all").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_round_selection_order_and_eligibility() {
    let state = state();
    let services = &state.services;
    let restaurant = seed_restaurant(services, "Dumplings", 111.0).await;

    let low = seed_ad(services, restaurant.id, 2).await;
    let high = seed_ad(services, restaurant.id, 9).await;
    let mid = seed_ad(services, restaurant.id, 5).await;
    let newer_mid = seed_ad(services, restaurant.id, 5).await;
    let retired = seed_ad(services, restaurant.id, 10).await;
    services.advertisements.deactivate_ad(retired.id).await.unwrap();

    let now = Utc::now();
    services
        .advertisements
        .create_ad(NewAdvertisement {
            start_date: now - chrono::Duration::days(10),
            end_date: now - chrono::Duration::days(1),
            ..new_ad(restaurant.id, 10)
        })
        .await
        .unwrap();
    services
        .advertisements
        .create_ad(NewAdvertisement {
            start_date: now + chrono::Duration::days(1),
            end_date: now + chrono::Duration::days(2),
            ..new_ad(restaurant.id, 10)
        })
        .await
        .unwrap();

    let selected = services.advertisements.select_for_round(3).await.unwrap();
    let ids: Vec<i64> = selected.iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![high.id, newer_mid.id, mid.id]);
    assert!(!ids.contains(&low.id));

    // Inactive and out-of-window ads still show up in the admin listing
    assert_eq!(services.advertisements.list_ads(100, 0).await.unwrap().len(), 7);
}

#[tokio::test]
async fn test_ad_administration_validates_input() {
    let state = state();
    let services = &state.services;
    let restaurant = seed_restaurant(services, "Dumplings", 111.0).await;

    let now = Utc::now();
    let backwards = NewAdvertisement {
        start_date: now,
        end_date: now,
        ..new_ad(restaurant.id, 3)
    };
    assert!(matches!(
        services.advertisements.create_ad(backwards).await,
        Err(AppError::InvalidInput(_))
    ));

    let out_of_range = NewAdvertisement {
        priority: 11,
        ..new_ad(restaurant.id, 3)
    };
    assert!(matches!(
        services.advertisements.create_ad(out_of_range).await,
        Err(AppError::InvalidInput(_))
    ));

    assert!(matches!(
        services.advertisements.create_ad(new_ad(9_999, 3)).await,
        Err(AppError::NotFound(_))
    ));

    let ad = seed_ad(services, restaurant.id, 3).await;
    assert_eq!(ad.view_count, 0);
    assert!(ad.is_active);

    let updated = services
        .advertisements
        .update_ad(
            ad.id,
            UpdateAdvertisement {
                title: Some("Dinner for two".to_string()),
                priority: Some(8),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Dinner for two");
    assert_eq!(updated.priority, 8);

    let shrink = UpdateAdvertisement {
        end_date: Some(ad.start_date),
        ..Default::default()
    };
    assert!(matches!(
        services.advertisements.update_ad(ad.id, shrink).await,
        Err(AppError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_view_of_unknown_ad_does_not_hold_cooldown() {
    let state = state();
    let services = &state.services;
    let session = Uuid::new_v4();

    assert!(matches!(
        services.advertisements.record_view(77, 1, session).await,
        Err(AppError::NotFound(_))
    ));
    // The failed write released its slot, so the retry reaches the store again
    assert!(matches!(
        services.advertisements.record_view(77, 1, session).await,
        Err(AppError::NotFound(_))
    ));
}
