use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::HashedCredentials;
use crate::timesheet::{HourEntry, WIRE_FORMAT};

const DEFAULT_BASE_URL: &str = "https://bvproduct.app/api";
const BASE_URL_ENV: &str = "SATNICA_API";

#[derive(Debug, Deserialize)]
struct StatusResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
pub struct Location {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct WorkType {
    pub value: String,
    pub title: String,
}

/// A failure payload carries only the response flag, so everything else
/// defaults to empty rather than failing deserialisation.
#[derive(Debug, Deserialize)]
pub struct UserProfile {
    pub response: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub clothes_size: String,
    #[serde(default)]
    pub footwear_size: String,
    #[serde(default)]
    pub date_of_birth: String,
}

// The add and update endpoints take the form fields under their original
// (Croatian) names; the renames keep the wire shape compatible.

#[derive(Debug, Serialize)]
pub struct NewHours {
    #[serde(rename = "datum")]
    pub date: String,
    #[serde(rename = "vrsta")]
    pub work_type: String,
    #[serde(rename = "lokacija")]
    pub location: String,
    #[serde(rename = "sati")]
    pub hours: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileForm {
    #[serde(rename = "ime")]
    pub name: String,
    #[serde(rename = "prezime")]
    pub surname: String,
    #[serde(rename = "mobitel")]
    pub phone: String,
    pub email: String,
    #[serde(rename = "adresa")]
    pub address: String,
    #[serde(rename = "odjeća")]
    pub clothes_size: String,
    #[serde(rename = "obuća")]
    pub footwear_size: String,
    #[serde(rename = "datum_rodenja")]
    pub date_of_birth: String,
}

/// Blocking JSON client for the remote hours API. Every endpoint is a POST
/// carrying the hashed credential pair in the body.
pub struct Api {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl Api {
    pub fn new() -> Api {
        let base_url =
            std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        Api::with_base_url(&base_url)
    }

    pub fn with_base_url(base_url: &str) -> Api {
        Api {
            client: reqwest::blocking::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// True when the server accepts the credential pair.
    pub fn login(&self, credentials: &HashedCredentials) -> Result<bool> {
        let rows: Vec<StatusResponse> =
            self.post("login.php", &credentials_payload(credentials))?;
        Ok(rows.first().map(|r| r.response == "Success").unwrap_or(false))
    }

    pub fn fetch_hours(
        &self,
        credentials: &HashedCredentials,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<HourEntry>> {
        let payload = json!({
            "username": credentials.username,
            "password": credentials.password,
            "start": start.format(WIRE_FORMAT).to_string(),
            "end": end.format(WIRE_FORMAT).to_string(),
        });
        self.post("hours.php", &payload)
    }

    /// Ack body is opaque, only transport success matters.
    pub fn add_hours(&self, credentials: &HashedCredentials, form: &NewHours) -> Result<()> {
        let payload = with_credentials(serde_json::to_value(form)?, credentials)?;
        self.post_ack("hours-add.php", &payload)
    }

    pub fn delete_hours(&self, credentials: &HashedCredentials, id: i64) -> Result<()> {
        let payload = json!({
            "username": credentials.username,
            "password": credentials.password,
            "id": id.to_string(),
        });
        let status: StatusResponse = self.post("hours-delete.php", &payload)?;
        if status.response == "Failure" {
            bail!("Server refused to delete hour entry {}", id);
        }
        Ok(())
    }

    pub fn fetch_locations(&self, credentials: &HashedCredentials) -> Result<Vec<Location>> {
        self.post("locations.php", &credentials_payload(credentials))
    }

    pub fn fetch_types(&self, credentials: &HashedCredentials) -> Result<Vec<WorkType>> {
        self.post("type.php", &credentials_payload(credentials))
    }

    pub fn fetch_profile(&self, credentials: &HashedCredentials) -> Result<UserProfile> {
        let rows: Vec<UserProfile> = self.post("profile.php", &credentials_payload(credentials))?;
        match rows.into_iter().next() {
            Some(profile) if profile.response == "Success" => Ok(profile),
            _ => bail!("Profile fetch returned an unexpected response"),
        }
    }

    pub fn update_profile(
        &self,
        credentials: &HashedCredentials,
        form: &ProfileForm,
    ) -> Result<()> {
        let payload = with_credentials(serde_json::to_value(form)?, credentials)?;
        self.post_ack("profile-update.php", &payload)
    }

    /// Hours grouped per location over a date range. The response shape is
    /// not strictly typed by the server, so it is passed through as-is.
    pub fn hours_by_location(
        &self,
        credentials: &HashedCredentials,
        start_day: NaiveDate,
        end_day: NaiveDate,
        location: &str,
    ) -> Result<serde_json::Value> {
        let payload = json!({
            "username": credentials.username,
            "password": credentials.password,
            "startday": start_day.format(WIRE_FORMAT).to_string(),
            "endday": end_day.format(WIRE_FORMAT).to_string(),
            "location": location,
        });
        self.post("locationsusers.php", &payload)
    }

    fn post<T: DeserializeOwned>(&self, endpoint: &str, payload: &serde_json::Value) -> Result<T> {
        self.send(endpoint, payload)?
            .json()
            .with_context(|| format!("Failed to de-serialise response from {}", endpoint))
    }

    fn post_ack(&self, endpoint: &str, payload: &serde_json::Value) -> Result<()> {
        let ack = self
            .send(endpoint, payload)?
            .text()
            .with_context(|| format!("Failed to read response from {}", endpoint))?;
        debug!("Ack from {}: {}", endpoint, ack);
        Ok(())
    }

    fn send(
        &self,
        endpoint: &str,
        payload: &serde_json::Value,
    ) -> Result<reqwest::blocking::Response> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("POST {}", url);
        self.client
            .post(url)
            .json(payload)
            .send()
            .with_context(|| format!("Request to {} failed", endpoint))?
            .error_for_status()
            .with_context(|| format!("Request to {} was rejected", endpoint))
    }
}

fn credentials_payload(credentials: &HashedCredentials) -> serde_json::Value {
    json!({
        "username": credentials.username,
        "password": credentials.password,
    })
}

fn with_credentials(
    mut payload: serde_json::Value,
    credentials: &HashedCredentials,
) -> Result<serde_json::Value> {
    let object = payload
        .as_object_mut()
        .context("Form payload must serialise to a JSON object")?;
    object.insert("username".to_owned(), json!(credentials.username));
    object.insert("password".to_owned(), json!(credentials.password));
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> HashedCredentials {
        HashedCredentials {
            username: "72019bbac0b3dac88beac9ddfef0ca808919104f".to_owned(),
            password: "cdca8723933a3ca36c5707a04ed0d7abbbd40c6a".to_owned(),
        }
    }

    #[test]
    fn new_hours_serialises_under_the_original_form_names() {
        let form = NewHours {
            date: "2024-03-04".to_owned(),
            work_type: "rad".to_owned(),
            location: "3".to_owned(),
            hours: "8".to_owned(),
        };
        let payload = with_credentials(serde_json::to_value(&form).unwrap(), &credentials())
            .unwrap();
        assert_eq!(payload["datum"], "2024-03-04");
        assert_eq!(payload["vrsta"], "rad");
        assert_eq!(payload["lokacija"], "3");
        assert_eq!(payload["sati"], "8");
        assert_eq!(payload["username"], credentials().username);
        assert_eq!(payload["password"], credentials().password);
    }

    #[test]
    fn profile_form_serialises_under_the_original_form_names() {
        let form = ProfileForm {
            name: "Ana".to_owned(),
            surname: "Horvat".to_owned(),
            phone: "0911234567".to_owned(),
            email: "ana@example.com".to_owned(),
            address: "Ilica 1".to_owned(),
            clothes_size: "M".to_owned(),
            footwear_size: "38".to_owned(),
            date_of_birth: "1990-01-01".to_owned(),
        };
        let payload = serde_json::to_value(&form).unwrap();
        assert_eq!(payload["ime"], "Ana");
        assert_eq!(payload["prezime"], "Horvat");
        assert_eq!(payload["mobitel"], "0911234567");
        assert_eq!(payload["email"], "ana@example.com");
        assert_eq!(payload["adresa"], "Ilica 1");
        assert_eq!(payload["odjeća"], "M");
        assert_eq!(payload["obuća"], "38");
        assert_eq!(payload["datum_rodenja"], "1990-01-01");
    }

    #[test]
    fn server_hours_rows_deserialise() {
        let rows: Vec<HourEntry> =
            serde_json::from_str(r#"[{"id":5,"date_of_work":"2024-03-04","hours":8}]"#).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, 5);
        assert_eq!(rows[0].hours, 8.0);
    }

    #[test]
    fn profile_rows_deserialise_with_the_response_flag() {
        let rows: Vec<UserProfile> = serde_json::from_str(
            r#"[{"response":"Success","name":"Ana","surname":"Horvat","phone":"0911234567",
                 "email":"ana@example.com","address":"Ilica 1","clothes_size":"M",
                 "footwear_size":"38","date_of_birth":"1990-01-01"}]"#,
        )
        .unwrap();
        assert_eq!(rows[0].response, "Success");
        assert_eq!(rows[0].name, "Ana");
    }

    #[test]
    fn profile_failure_payload_deserialises_without_the_profile_fields() {
        let rows: Vec<UserProfile> =
            serde_json::from_str(r#"[{"response":"Failure"}]"#).unwrap();
        assert_eq!(rows[0].response, "Failure");
        assert_eq!(rows[0].name, "");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let api = Api::with_base_url("https://example.test/api/");
        assert_eq!(api.base_url, "https://example.test/api");
    }
}
