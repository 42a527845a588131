//! Hard-coded canonical city list, keyed by canonical domain — the last
//! resort in the city-discovery cascade (§4.4 step 3). Verbatim from
//! `_get_common_cities` in the scraper this spec was distilled from.

use std::collections::HashMap;
use std::sync::OnceLock;

static COMMON_CITIES: OnceLock<HashMap<&'static str, &'static [&'static str]>> = OnceLock::new();

fn common_cities() -> &'static HashMap<&'static str, &'static [&'static str]> {
    COMMON_CITIES.get_or_init(|| {
        HashMap::from([
            ("yello.ae", &[
                "Dubai", "Abu Dhabi", "Sharjah", "Ajman", "Ras Al Khaimah", "Fujairah",
                "Umm Al Quwain",
            ][..]),
            ("yelu.in", &[
                "Mumbai", "Delhi", "Bangalore", "Chennai", "Kolkata", "Hyderabad", "Pune",
                "Ahmedabad",
            ][..]),
            ("ghanayellow.com", &[
                "Accra", "Kumasi", "Tamale", "Cape Coast", "Sekondi-Takoradi", "Sunyani", "Ho",
            ][..]),
            ("businesslist.pk", &[
                "Karachi", "Lahore", "Faisalabad", "Islamabad", "Rawalpindi", "Gujranwala",
                "Sialkot", "Multan", "Peshawar", "Hyderabad", "Quetta", "Bahawalpur", "Gujrat",
                "Abbottabad", "Rawalpini", "Sargodha", "Kasur", "Sukkur", "Sahiwal", "Larkana",
                "Jhelum", "Daska", "Okara", "Wazirabad", "Jhang", "Mardan", "Chiniot",
                "Rahim Yar Khan", "Chakwal", "Hafizabad", "Mandi Bahauddin", "Taxila", "Swabi",
                "Vehari", "Wah Cantonment", "Nowshera", "Nawabshah", "Khairpur", "Burewala",
                "Kamoke", "Kohat", "Dera Ghazi Khan", "Muridke", "Toba Tek Singh", "Dadu",
                "Chishtian", "Timergara", "Kamalia", "Khanewal", "Mingora", "Mirpur Khas",
                "Gojra", "Khushab", "Pakpattan", "Bahawalnagar", "Shekhupura", "Sadiqabad",
                "Dera Ismail Khan", "Muzaffargarh", "Ahmadpur East", "Chakdara", "Chaman",
                "Jaranwala", "Khanpur", "Kot Adu", "Shikarpur", "Tando Allahyar", "Jacobabad",
                "Khuzdar",
            ][..]),
            ("businesslist.com.ng", &[
                "Lagos", "Abuja", "Kano", "Ibadan", "Port Harcourt", "Benin City", "Maiduguri",
            ][..]),
            ("businesslist.co.ke", &[
                "Nairobi", "Mombasa", "Kisumu", "Nakuru", "Eldoret", "Thika", "Malindi",
            ][..]),
            ("yellosa.co.za", &[
                "Johannesburg", "Cape Town", "Durban", "Pretoria", "Port Elizabeth",
                "Bloemfontein",
            ][..]),
            ("yelu.uk", &[
                "London", "Manchester", "Birmingham", "Liverpool", "Leeds", "Sheffield",
                "Bristol",
            ][..]),
            ("yelu.sg", &[
                "Central Singapore", "North Singapore", "South Singapore", "East Singapore",
                "West Singapore",
            ][..]),
            ("australiayp.com", &[
                "Sydney", "Melbourne", "Brisbane", "Perth", "Adelaide", "Canberra", "Darwin",
            ][..]),
        ])
    })
}

const DEFAULT_CITIES: &[&str] = &["Capital", "Main City", "Central"];

/// City names for `canonical_domain`, falling back to a generic default
/// triple for unlisted domains — matches the Python fallback's behavior of
/// never returning an empty list.
pub fn fallback_cities(canonical_domain: &str) -> &'static [&'static str] {
    common_cities()
        .get(canonical_domain)
        .copied()
        .unwrap_or(DEFAULT_CITIES)
}

pub fn city_slug(name: &str) -> String {
    name.to_lowercase().replace(' ', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_domain_returns_its_cities() {
        let cities = fallback_cities("yello.ae");
        assert!(cities.contains(&"Dubai"));
        assert_eq!(cities.len(), 7);
    }

    #[test]
    fn unknown_domain_returns_default_triple() {
        assert_eq!(fallback_cities("unknown.example"), DEFAULT_CITIES);
    }

    #[test]
    fn slug_lowercases_and_hyphenates() {
        assert_eq!(city_slug("Ras Al Khaimah"), "ras-al-khaimah");
    }
}
