//! End-to-end scenarios driving `Orchestrator::handle_message` against a
//! mock issuing client, matching the six literal dialogues used to validate
//! the emission state machine.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use jack_core::JackConfig;
use jack_issuing::{IssuingClient, StoreRequest, StoreResponse};
use jack_orchestrator::{NullAnswerModel, Orchestrator};
use jack_sessions::{ClientIdentification, HistoryRecord, Product};

struct MockIssuing {
    store_calls: Mutex<Vec<StoreRequest>>,
    check_calls: Mutex<Vec<String>>,
    products: Vec<Product>,
    miss_once_for: Option<&'static str>,
}

impl MockIssuing {
    fn new() -> Self {
        Self {
            store_calls: Mutex::new(Vec::new()),
            check_calls: Mutex::new(Vec::new()),
            products: Vec::new(),
            miss_once_for: None,
        }
    }

    fn with_products(products: Vec<Product>) -> Self {
        Self { products, ..Self::new() }
    }

    fn missing_document(document: &'static str) -> Self {
        Self {
            miss_once_for: Some(document),
            ..Self::new()
        }
    }
}

#[async_trait]
impl IssuingClient for MockIssuing {
    async fn identify(&self, _phone: &str) -> jack_issuing::error::Result<ClientIdentification> {
        Ok(ClientIdentification {
            id_empresa: "EMP1".to_string(),
            id_establecimiento: "0001".to_string(),
            id_usuario: 42,
            nombre: Some("Carlos".to_string()),
        })
    }

    async fn check_client(&self, _phone: &str, document_number: &str) -> (bool, String) {
        self.check_calls.lock().unwrap().push(document_number.to_string());
        if self.miss_once_for == Some(document_number) && self.check_calls.lock().unwrap().iter().filter(|d| d.as_str() == document_number).count() == 1 {
            return (false, "no encontrado".to_string());
        }
        (true, "Cliente de Prueba".to_string())
    }

    async fn products(&self, _phone: &str) -> Vec<Product> {
        self.products.clone()
    }

    async fn clients(&self, _phone: &str) -> Vec<serde_json::Value> {
        Vec::new()
    }

    async fn history(&self, _phone: &str) -> Vec<HistoryRecord> {
        Vec::new()
    }

    async fn store(&self, request: StoreRequest) -> jack_issuing::error::Result<StoreResponse> {
        self.store_calls.lock().unwrap().push(clone_request(&request));
        Ok(StoreResponse {
            success: "true".to_string(),
            estado: "OK".to_string(),
            serie: "B001".to_string(),
            numero: "123".to_string(),
            id: 1,
            mensaje: String::new(),
            pdf: "https://tinred.pe/pdf/B001-123.pdf".to_string(),
        })
    }
}

fn clone_request(r: &StoreRequest) -> StoreRequest {
    StoreRequest {
        id_empresa: r.id_empresa.clone(),
        id_establecimiento: r.id_establecimiento.clone(),
        id_usuario: r.id_usuario.clone(),
        tdocod: r.tdocod.clone(),
        mondoc: r.mondoc.clone(),
        tdicod: r.tdicod.clone(),
        clinum: r.clinum.clone(),
        cant: r.cant.clone(),
        detpro: r.detpro.clone(),
        preuni: r.preuni.clone(),
        total: r.total.clone(),
    }
}

async fn authenticated_orchestrator(issuing: MockIssuing) -> (Orchestrator, &'static str) {
    let config = JackConfig::default();
    let orchestrator = Orchestrator::new(&config, Arc::new(issuing), None, Arc::new(NullAnswerModel));
    let phone = "51999888777";
    orchestrator.handle_message(phone, Some("hola"), None).await;
    orchestrator.handle_message(phone, Some("si"), None).await;
    (orchestrator, phone)
}

#[tokio::test]
async fn scenario_1_happy_path_receipt_via_dni() {
    let issuing = MockIssuing::new();
    let (orchestrator, phone) = authenticated_orchestrator(issuing).await;

    let summary = orchestrator
        .handle_message(phone, Some("Boleta DNI 12345678, 2 cuadernos a 15, 5 lapiceros a 3"), None)
        .await;
    assert!(summary.contains("S/ 45.00"), "summary was: {summary}");

    let reply = orchestrator.handle_message(phone, Some("Sí"), None).await;
    assert!(reply.contains("B001-123"));
    assert!(reply.contains("https://tinred.pe/pdf/B001-123.pdf"));
}

#[tokio::test]
async fn scenario_2_invoice_via_ruc_disambiguation_turn() {
    let issuing = MockIssuing::new();
    let (orchestrator, phone) = authenticated_orchestrator(issuing).await;

    let first = orchestrator.handle_message(phone, Some("Factura"), None).await;
    assert!(first.contains("RUC"));

    orchestrator.handle_message(phone, Some("20161541991"), None).await;
    let summary = orchestrator.handle_message(phone, Some("3 laptops a 2500"), None).await;
    assert!(summary.contains("S/ 7500.00"), "summary was: {summary}");

    orchestrator.handle_message(phone, Some("Sí"), None).await;
}

#[tokio::test]
async fn scenario_3_client_not_found_then_corrected() {
    let issuing = MockIssuing::missing_document("11111111");
    let (orchestrator, phone) = authenticated_orchestrator(issuing).await;

    let reply = orchestrator.handle_message(phone, Some("Boleta 11111111, 1 libro a 40"), None).await;
    assert!(reply.contains("confirmar") || reply.contains("correcto"), "reply was: {reply}");

    let summary = orchestrator.handle_message(phone, Some("87654321"), None).await;
    assert!(summary.contains("S/ 40.00"), "summary was: {summary}");

    let reply = orchestrator.handle_message(phone, Some("Sí"), None).await;
    assert!(reply.contains("B001-123"));
}

#[tokio::test]
async fn scenario_4_cancel_mid_flow() {
    let issuing = MockIssuing::new();
    let (orchestrator, phone) = authenticated_orchestrator(issuing).await;

    orchestrator.handle_message(phone, Some("Factura RUC 20161541991"), None).await;
    let reply = orchestrator.handle_message(phone, Some("cancelar"), None).await;
    assert!(reply.contains("Cancelad") || reply.contains("cancelad"), "reply was: {reply}");
}

#[tokio::test]
async fn scenario_5_items_without_price() {
    let issuing = MockIssuing::new();
    let (orchestrator, phone) = authenticated_orchestrator(issuing).await;

    let reply = orchestrator.handle_message(phone, Some("Boleta DNI 12345678, 3 cuadernos"), None).await;
    assert!(reply.contains("precio"), "reply was: {reply}");

    let reply = orchestrator.handle_message(phone, Some("20"), None).await;
    assert!(reply.contains("S/ 60.00") || reply.contains("confirma"), "reply was: {reply}");
}

#[tokio::test]
async fn scenario_6_catalogue_seeded_emission() {
    let product = Product {
        procod: "P1".to_string(),
        pronom: "Laptop HP".to_string(),
        provun: "2500.00".to_string(),
        promed: "UND".to_string(),
    };
    let issuing = MockIssuing::with_products(vec![product]);
    let (orchestrator, phone) = authenticated_orchestrator(issuing).await;

    orchestrator.handle_message(phone, Some("productos"), None).await;
    orchestrator.handle_message(phone, Some("busca laptop"), None).await;
    orchestrator.handle_message(phone, Some("1"), None).await;
    orchestrator.handle_message(phone, Some("Sí"), None).await;
    orchestrator.handle_message(phone, Some("Boleta"), None).await;
    let summary = orchestrator.handle_message(phone, Some("DNI 12345678"), None).await;
    assert!(summary.contains("Laptop HP"), "summary was: {summary}");
    assert!(summary.contains("S/ 2500.00"), "summary was: {summary}");
}
