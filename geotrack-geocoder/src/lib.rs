mod nominatim;

pub use nominatim::{GEOCODER_URL, NominatimGeocoder};
