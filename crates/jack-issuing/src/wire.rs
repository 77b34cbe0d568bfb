use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct PhoneRequest<'a> {
    pub telefono: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CheckClientRequest<'a> {
    pub telefono: &'a str,
    pub numero_documento: &'a str,
}

/// `checkclient_agente_ai` replies `{"01": "<NAME>"}` on a hit or
/// `{"00": "<message>"}` on a miss — the key itself carries the verdict, not
/// a field value, so this is deserialized as a map rather than a fixed shape.
pub type CheckClientResponse = std::collections::HashMap<String, String>;

#[derive(Debug, Serialize)]
pub struct StoreRequest {
    #[serde(rename = "idEmpresa")]
    pub id_empresa: String,
    #[serde(rename = "idEstablecimiento")]
    pub id_establecimiento: String,
    #[serde(rename = "idUsuario")]
    pub id_usuario: String,
    pub tdocod: String,
    pub mondoc: String,
    pub tdicod: String,
    pub clinum: String,
    pub cant: Vec<String>,
    pub detpro: Vec<String>,
    pub preuni: Vec<String>,
    pub total: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreResponse {
    #[serde(default)]
    pub success: String,
    #[serde(default)]
    pub estado: String,
    #[serde(default)]
    pub serie: String,
    #[serde(default)]
    pub numero: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub mensaje: String,
    #[serde(default)]
    pub pdf: String,
}

impl StoreResponse {
    pub fn is_successful(&self) -> bool {
        self.success.eq_ignore_ascii_case("true")
    }

    pub fn full_number(&self) -> String {
        format!("{}-{}", self.serie, self.numero)
    }
}
