//! Catalog seeding — bulk-admits a fixed list of known directory domains as
//! pending jobs, deduping through the same canonicalization admission uses.

use serde::{Deserialize, Serialize};

use crate::admission::Admission;
use crate::domain::{canonicalize, Job};
use crate::error::AppError;
use crate::store::Store;

/// One directory domain within a region, as shipped in the built-in catalog.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Country {
    pub name: String,
    pub domain: String,
    pub url: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A geographic grouping of domains, e.g. "Africa" or "Middle East".
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Region {
    pub region: String,
    pub countries: Vec<Country>,
}

/// The nested catalog shape seeding walks: regions, each holding the domains
/// known within it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Catalog {
    pub countries: Vec<Region>,
}

/// The directory domains this crawler ships knowledge of, mirroring the
/// hard-coded catalog the original scraper seeded on first run.
pub fn default_catalog() -> Catalog {
    Catalog {
        countries: vec![
            Region {
                region: "Middle East".into(),
                countries: vec![Country {
                    name: "Yello UAE".into(),
                    domain: "yello.ae".into(),
                    url: "https://www.yello.ae".into(),
                    latitude: 23.4241,
                    longitude: 53.8478,
                }],
            },
            Region {
                region: "Asia".into(),
                countries: vec![
                    Country {
                        name: "Yelu India".into(),
                        domain: "yelu.in".into(),
                        url: "https://www.yelu.in".into(),
                        latitude: 20.5937,
                        longitude: 78.9629,
                    },
                    Country {
                        name: "Business List Pakistan".into(),
                        domain: "businesslist.pk".into(),
                        url: "https://www.businesslist.pk".into(),
                        latitude: 30.3753,
                        longitude: 69.3451,
                    },
                    Country {
                        name: "Yelu Singapore".into(),
                        domain: "yelu.sg".into(),
                        url: "https://www.yelu.sg".into(),
                        latitude: 1.3521,
                        longitude: 103.8198,
                    },
                ],
            },
            Region {
                region: "Africa".into(),
                countries: vec![
                    Country {
                        name: "Ghana Yellow".into(),
                        domain: "ghanayellow.com".into(),
                        url: "https://www.ghanayellow.com".into(),
                        latitude: 7.9465,
                        longitude: -1.0232,
                    },
                    Country {
                        name: "Business List Nigeria".into(),
                        domain: "businesslist.com.ng".into(),
                        url: "https://www.businesslist.com.ng".into(),
                        latitude: 9.0820,
                        longitude: 8.6753,
                    },
                    Country {
                        name: "Business List Kenya".into(),
                        domain: "businesslist.co.ke".into(),
                        url: "https://www.businesslist.co.ke".into(),
                        latitude: -0.0236,
                        longitude: 37.9062,
                    },
                    Country {
                        name: "Yellow SA".into(),
                        domain: "yellosa.co.za".into(),
                        url: "https://www.yellosa.co.za".into(),
                        latitude: -30.5595,
                        longitude: 22.9375,
                    },
                ],
            },
            Region {
                region: "Europe".into(),
                countries: vec![Country {
                    name: "Yelu UK".into(),
                    domain: "yelu.uk".into(),
                    url: "https://www.yelu.uk".into(),
                    latitude: 55.3781,
                    longitude: -3.4360,
                }],
            },
            Region {
                region: "Oceania".into(),
                countries: vec![Country {
                    name: "Australia YP".into(),
                    domain: "australiayp.com".into(),
                    url: "https://www.australiayp.com".into(),
                    latitude: -25.2744,
                    longitude: 133.7751,
                }],
            },
        ],
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub created: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// Builds the pending `Job` for one catalog entry, tagging it with the
/// region/country metadata the catalog carries so a seeded job is
/// distinguishable from one created through the ordinary admission API.
fn build_job(region: &str, country: &Country) -> Job {
    let mut job = Job::new(&country.name, &country.domain);
    job.region = Some(region.to_string());
    job.country = Some(country.name.clone());
    job.base_url = Some(country.url.clone());
    job.latitude = Some(country.latitude);
    job.longitude = Some(country.longitude);
    job.is_seeded = true;
    job
}

/// Admits every catalog entry not already covered by an active job. A
/// `DomainBusy` rejection is treated as a skip, not an error — seeding is
/// meant to be safely re-run on every startup.
///
/// When `overwrite` is true, a prior job for the same canonical domain
/// (active or terminal) is deleted before the new one is admitted, so a
/// re-seed can refresh stale catalog metadata. Without it, only domains with
/// no existing job at all get created on a re-run.
pub async fn seed_from_catalog(
    admission: &Admission,
    store: &Store,
    catalog: &Catalog,
    overwrite: bool,
) -> SeedReport {
    let mut report = SeedReport::default();

    for region in &catalog.countries {
        for country in &region.countries {
            if overwrite {
                let canonical = canonicalize(&country.domain);
                match store.jobs.find_by_canonical_domain(&canonical).await {
                    Ok(Some(existing)) => {
                        if let Err(err) = store.jobs.delete(&existing.id).await {
                            tracing::warn!(domain = %country.domain, error = %err, "failed to clear prior seeded job");
                            report.errors.push(format!("{}: {err}", country.domain));
                            continue;
                        }
                    }
                    Ok(None) => {}
                    Err(err) => {
                        tracing::warn!(domain = %country.domain, error = %err, "failed to look up prior seeded job");
                        report.errors.push(format!("{}: {err}", country.domain));
                        continue;
                    }
                }
            }

            let job = build_job(&region.region, country);
            match admission.admit_job(job).await {
                Ok(job) => {
                    tracing::info!(job_id = %job.id, domain = %country.domain, "catalog domain seeded");
                    report.created += 1;
                }
                Err(AppError::DomainBusy(_)) => {
                    report.skipped += 1;
                }
                Err(err) => {
                    tracing::warn!(domain = %country.domain, error = %err, "failed to seed catalog domain");
                    report.errors.push(format!("{}: {err}", country.domain));
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_pool;

    fn catalog_len(catalog: &Catalog) -> usize {
        catalog.countries.iter().map(|r| r.countries.len()).sum()
    }

    #[tokio::test]
    async fn seeds_default_catalog_once() {
        let store = Store::new(test_pool().await);
        let admission = Admission::new(store.clone());
        let catalog = default_catalog();
        let total = catalog_len(&catalog);

        let first = seed_from_catalog(&admission, &store, &catalog, false).await;
        assert_eq!(first.created, total);
        assert_eq!(first.skipped, 0);

        let second = seed_from_catalog(&admission, &store, &catalog, false).await;
        assert_eq!(second.created, 0);
        assert_eq!(second.skipped, total);
    }

    #[tokio::test]
    async fn overwrite_replaces_prior_seeded_job() {
        let store = Store::new(test_pool().await);
        let admission = Admission::new(store.clone());
        let catalog = default_catalog();

        let first = seed_from_catalog(&admission, &store, &catalog, false).await;
        assert_eq!(first.skipped, 0);

        let second = seed_from_catalog(&admission, &store, &catalog, true).await;
        assert_eq!(second.created, catalog_len(&catalog));
        assert_eq!(second.skipped, 0);
    }

    #[tokio::test]
    async fn tags_seeded_job_metadata() {
        let store = Store::new(test_pool().await);
        let admission = Admission::new(store.clone());
        let catalog = default_catalog();

        seed_from_catalog(&admission, &store, &catalog, false).await;

        let job = store
            .jobs
            .find_by_canonical_domain(&canonicalize("yello.ae"))
            .await
            .unwrap()
            .expect("seeded job present");
        assert!(job.is_seeded);
        assert_eq!(job.region.as_deref(), Some("Middle East"));
        assert_eq!(job.base_url.as_deref(), Some("https://www.yello.ae"));
        assert_eq!(job.latitude, Some(23.4241));
    }
}
