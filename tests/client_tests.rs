use std::sync::{Arc, Mutex};

use chrono::NaiveTime;
use infinitude::{
    Activity, ApiRevision, FanMode, HoldMode, HoldRequest, InfinitudeClient,
    InfinitudeClientBuilder, MessageLogMode, OperatingMode, Preset, SetpointRequest, Temperature,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn hm(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn period(time: &str, activity: &str, enabled: &str) -> Value {
    json!({"time": [time], "activity": [activity], "enabled": [enabled]})
}

fn activity(id: &str, htsp: &str, clsp: &str, fan: &str) -> Value {
    json!({"id": id, "htsp": [htsp], "clsp": [clsp], "fan": [fan]})
}

/// 2024-03-04 is a Monday; at 09:30 the program is in `away` until 17:00.
fn status_body(conditioning: &str) -> Value {
    json!({
        "localTime": ["2024-03-04T09:30:00-05:00"],
        "mode": ["heat"],
        "oat": ["41"],
        "idu": [{"cfm": ["400"]}],
        "zones": [{
            "zone": [
                {"id": "1", "name": ["Main Floor"], "rt": ["69.0"], "rh": ["40"],
                 "zoneconditioning": [conditioning], "fan": ["off"],
                 "htsp": ["62.0"], "clsp": ["85.0"], "currentActivity": ["away"],
                 "occupancy": ["unoccupied"], "enabled": ["on"]},
                {"id": "2", "name": ["Zone 2"], "rt": ["--"], "rh": ["--"], "enabled": ["off"]}
            ]
        }]
    })
}

fn config_body(mode: &str) -> Value {
    json!({
        "data": {
            "mode": [mode],
            "cfgem": ["F"],
            "zones": [{
                "zone": [{
                    "id": "1",
                    "hold": ["off"],
                    "holdActivity": [{}],
                    "otmr": [{}],
                    "activities": [{
                        "activity": [
                            activity("home", "70.0", "78.0", "off"),
                            activity("away", "62.0", "85.0", "off"),
                            activity("sleep", "66.0", "80.0", "low"),
                            activity("wake", "70.0", "78.0", "off"),
                            activity("manual", "68.0", "80.0", "off")
                        ]
                    }],
                    "program": [{
                        "day": [
                            {"id": "Monday", "period": [
                                period("06:00", "wake", "on"),
                                period("08:00", "away", "on"),
                                period("17:00", "home", "on"),
                                period("22:00", "sleep", "on")
                            ]},
                            {"id": "Tuesday", "period": [
                                period("06:00", "wake", "on"),
                                period("22:00", "sleep", "on")
                            ]}
                        ]
                    }]
                }]
            }]
        }
    })
}

async fn mount_snapshot(server: &MockServer, conditioning: &str, mode: &str) {
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body(conditioning)))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(config_body(mode)))
        .mount(server)
        .await;
}

fn builder_for(server: &MockServer) -> InfinitudeClientBuilder {
    let addr = server.address();
    InfinitudeClient::builder(addr.ip().to_string()).port(addr.port())
}

async fn refreshed_client(server: &MockServer) -> InfinitudeClient {
    mount_snapshot(server, "active_heat", "heat").await;
    let mut client = builder_for(server).build().expect("build should succeed");
    client.refresh().await.expect("refresh should succeed");
    client
}

fn ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string("")
}

#[tokio::test]
async fn refresh_builds_enabled_zones() {
    let server = MockServer::start().await;
    let client = refreshed_client(&server).await;

    assert_eq!(client.zones().len(), 1);
    let zone = client.zone(1).expect("zone 1 should exist");
    assert_eq!(zone.name, "Main Floor");
    assert_eq!(zone.current_temperature.value(), 69.0);
    assert_eq!(zone.current_humidity, 40.0);
    assert_eq!(zone.operating_mode, OperatingMode::Heat);
    assert_eq!(zone.hold_mode, HoldMode::Schedule);
    assert_eq!(zone.preset, Preset::Away);
    assert_eq!(zone.current_activity, Some(Activity::Away));
    assert_eq!(zone.target_temperature().value(), 62.0);
    assert_eq!(zone.outdoor_temperature.unwrap().value(), 41.0);
    assert_eq!(zone.airflow_cfm, Some(400.0));

    let scheduled = zone.schedule.scheduled.as_ref().unwrap();
    let next = zone.schedule.next.as_ref().unwrap();
    assert_eq!(scheduled.activity, "away");
    assert_eq!(next.activity, "home");
    assert_eq!(next.start.time(), hm(17, 0));
    assert!(client.zone(2).is_none());
}

#[tokio::test]
async fn refresh_accepts_envelope_and_flat_schema() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": {
                "localTime": "2024-03-04T23:59:00-05:00",
                "oat": {},
                "zones": [{"id": 1, "name": "Den", "rt": 71, "rh": 38,
                           "zoneconditioning": "idle", "fan": "med",
                           "htsp": 68, "clsp": 76, "currentActivity": "home",
                           "enabled": "on"}]
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/system"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "mode": "auto",
            "cfgem": "F",
            "zones": [{
                "id": 1, "hold": "on", "holdActivity": "", "otmr": "",
                "activities": [{"id": "manual", "htsp": 67, "clsp": 77, "fan": "off"}],
                "program": [
                    {"id": "Monday", "period": [period("18:00", "home", "on")]},
                    {"id": "Tuesday", "period": [period("06:00", "wake", "on")]}
                ]
            }]
        })))
        .mount(&server)
        .await;

    let mut client = builder_for(&server)
        .revision(ApiRevision::Indexed)
        .config_path("/api/system")
        .build()
        .unwrap();
    client.refresh().await.unwrap();

    let zone = client.zone(1).unwrap();
    assert_eq!(zone.name, "Den");
    assert_eq!(zone.fan_mode, FanMode::Med);
    assert_eq!(zone.hold_mode, HoldMode::Hold);
    assert_eq!(zone.preset, Preset::Hold);
    assert!(zone.outdoor_temperature.is_none());
    assert_eq!(zone.schedule.scheduled.as_ref().unwrap().activity, "home");
    assert_eq!(zone.schedule.next.as_ref().unwrap().activity, "wake");
    assert_eq!(zone.target_temperature().value(), 71.0);
    assert_eq!(zone.target_temperature_low().unwrap().value(), 68.0);
}

#[tokio::test]
async fn refresh_failure_keeps_previous_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body("idle")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(config_body("heat")))
        .mount(&server)
        .await;

    let mut client = builder_for(&server).build().unwrap();
    client.refresh().await.unwrap();
    let before = client.zone(1).cloned().unwrap();

    let err = client.refresh().await.unwrap_err();
    assert!(matches!(err, infinitude::Error::Http(_)), "expected Http, got {err:?}");
    assert_eq!(client.zone(1), Some(&before));
}

#[tokio::test]
async fn missing_required_field_aborts_refresh() {
    let server = MockServer::start().await;
    let mut broken = status_body("idle");
    broken["zones"][0]["zone"][0]
        .as_object_mut()
        .unwrap()
        .remove("name");
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(broken))
        .mount(&server)
        .await;

    let mut client = builder_for(&server).build().unwrap();
    let err = client.refresh().await.unwrap_err();
    assert!(matches!(err, infinitude::Error::MissingField(ref f) if f == "name"));
    assert!(client.zones().is_empty());
}

#[tokio::test]
async fn discover_zones_lists_enabled_only() {
    let server = MockServer::start().await;
    mount_snapshot(&server, "idle", "heat").await;
    let mut client = builder_for(&server).build().unwrap();
    assert_eq!(client.discover_zones().await.unwrap(), vec![1]);
}

#[tokio::test]
async fn set_temperature_writes_manual_activity_and_holds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/activities/manual"))
        .and(body_partial_json(json!({"htsp": 72.0, "clsp": 85.0, "fan": "off"})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/"))
        .and(body_partial_json(json!({"hold": "on", "holdActivity": "manual", "otmr": "17:00"})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let mut client = refreshed_client(&server).await;
    client
        .set_temperature(1, SetpointRequest::target(Temperature::from_fahrenheit(72.0)))
        .await
        .expect("set_temperature should succeed");

    let zone = client.zone(1).unwrap();
    assert_eq!(zone.heat_setpoint.unwrap().value(), 72.0);
    assert_eq!(zone.target_temperature().value(), 72.0);
    assert_eq!(zone.current_activity, Some(Activity::Manual));
    assert_eq!(zone.hold_mode, HoldMode::HoldUntil);
    assert_eq!(zone.hold_until, Some(hm(17, 0)));
    assert_eq!(zone.preset, Preset::Override);
}

#[tokio::test]
async fn set_temperature_converts_units_and_rounds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/activities/manual"))
        .and(body_partial_json(json!({"htsp": 72.0})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/"))
        .respond_with(ok())
        .mount(&server)
        .await;

    let mut client = refreshed_client(&server).await;
    // 22.3 C is 72.14 F.
    client
        .set_temperature(1, SetpointRequest::target(Temperature::from_celsius(22.3)))
        .await
        .unwrap();
}

#[tokio::test]
async fn single_target_in_idle_auto_is_rejected() {
    let server = MockServer::start().await;
    mount_snapshot(&server, "idle", "auto").await;
    let mut client = builder_for(&server).build().unwrap();
    client.refresh().await.unwrap();

    let err = client
        .set_temperature(1, SetpointRequest::target(Temperature::from_fahrenheit(72.0)))
        .await
        .unwrap_err();
    assert!(matches!(err, infinitude::Error::InvalidMode(_)));
}

#[tokio::test]
async fn set_range_in_auto_writes_both_setpoints() {
    let server = MockServer::start().await;
    mount_snapshot(&server, "idle", "auto").await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/zone/0/activities/activity/4/"))
        .and(body_partial_json(json!({"htsp": 66.0, "clsp": 79.0})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/zone/0/"))
        .and(body_partial_json(json!({"hold": "on", "holdActivity": "manual"})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let mut client = builder_for(&server)
        .revision(ApiRevision::Indexed)
        .build()
        .unwrap();
    client.refresh().await.unwrap();
    client
        .set_temperature(
            1,
            SetpointRequest::range(Temperature::from_fahrenheit(66.0), Temperature::from_fahrenheit(79.0)),
        )
        .await
        .unwrap();

    let zone = client.zone(1).unwrap();
    assert_eq!(zone.target_temperature_low().unwrap().value(), 66.0);
    assert_eq!(zone.target_temperature_high().unwrap().value(), 79.0);
}

#[tokio::test]
async fn set_fan_mode_keeps_setpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/activities/manual"))
        .and(body_partial_json(json!({"fan": "high", "htsp": 62.0, "clsp": 85.0})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/"))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let mut client = refreshed_client(&server).await;
    client.set_fan_mode(1, FanMode::High).await.unwrap();
    assert_eq!(client.zone(1).unwrap().fan_mode, FanMode::High);
}

#[tokio::test]
async fn set_fan_auto_writes_off() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/activities/manual"))
        .and(body_partial_json(json!({"fan": "off"})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/"))
        .respond_with(ok())
        .mount(&server)
        .await;

    let mut client = refreshed_client(&server).await;
    client.set_fan_mode(1, FanMode::Auto).await.unwrap();
}

#[tokio::test]
async fn set_operating_mode_posts_config_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config"))
        .and(body_partial_json(json!({"mode": "cool"})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/"))
        .respond_with(ok())
        .expect(0)
        .mount(&server)
        .await;

    let mut client = refreshed_client(&server).await;
    client.set_operating_mode(OperatingMode::Cool).await.unwrap();
    let zone = client.zone(1).unwrap();
    assert_eq!(zone.operating_mode, OperatingMode::Cool);
    assert_eq!(zone.target_temperature().value(), 85.0);
}

#[tokio::test]
async fn preset_schedule_clears_hold() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/"))
        .and(body_partial_json(json!({"hold": "off", "holdActivity": null, "otmr": null})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let mut client = refreshed_client(&server).await;
    client.set_preset_mode(1, Preset::Schedule).await.unwrap();
    assert_eq!(client.zone(1).unwrap().hold_mode, HoldMode::Schedule);
}

#[tokio::test]
async fn preset_activity_holds_until_next_period() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/"))
        .and(body_partial_json(json!({"hold": "on", "holdActivity": "sleep", "otmr": "17:00"})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let mut client = refreshed_client(&server).await;
    client.set_preset_mode(1, Preset::Sleep).await.unwrap();
    let zone = client.zone(1).unwrap();
    assert_eq!(zone.preset, Preset::Sleep);
    assert_eq!(zone.hold_mode, HoldMode::HoldUntil);
}

#[tokio::test]
async fn explicit_hold_request_is_used_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/"))
        .and(body_partial_json(json!({"hold": "on", "holdActivity": "home", "otmr": "20:15"})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let mut client = refreshed_client(&server).await;
    let request = HoldRequest::new(HoldMode::HoldUntil)
        .activity(Activity::Home)
        .until(hm(20, 15));
    client.set_hold_mode(1, request).await.unwrap();
    assert_eq!(client.zone(1).unwrap().hold_until, Some(hm(20, 15)));
}

#[tokio::test]
async fn away_mode_is_indefinite_away_hold() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/"))
        .and(body_partial_json(json!({"hold": "on", "holdActivity": "away", "otmr": null})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let mut client = refreshed_client(&server).await;
    client.set_away(1, true).await.unwrap();
    let zone = client.zone(1).unwrap();
    assert!(zone.is_away());
    assert_eq!(zone.preset, Preset::Hold);
}

#[tokio::test]
async fn failed_write_keeps_optimistic_update() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut client = refreshed_client(&server).await;
    let err = client.set_away(1, true).await.unwrap_err();
    assert!(matches!(err, infinitude::Error::Http(_)));
    assert!(client.zone(1).unwrap().is_away());
}

#[tokio::test]
async fn writes_are_sent_when_a_zone_cannot_be_rebuilt() {
    let server = MockServer::start().await;
    let mut status = status_body("idle");
    status["zones"][0]["zone"][1] = json!({
        "id": "2", "name": ["Upstairs"], "rt": ["67.0"], "rh": ["42"],
        "zoneconditioning": ["idle"], "fan": ["off"], "htsp": ["64.0"], "clsp": ["80.0"],
        "currentActivity": ["home"], "enabled": ["on"]
    });
    let mut full_config = config_body("heat");
    let zone_two = {
        let mut z = full_config["data"]["zones"][0]["zone"][0].clone();
        z["id"] = json!("2");
        z
    };
    full_config["data"]["zones"][0]["zone"]
        .as_array_mut()
        .unwrap()
        .push(zone_two);

    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(full_config))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(config_body("heat")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/config"))
        .and(body_partial_json(json!({"mode": "cool"})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/2/"))
        .and(body_partial_json(json!({"hold": "on", "holdActivity": "away"})))
        .respond_with(ok())
        .expect(1)
        .mount(&server)
        .await;

    let mut client = builder_for(&server).build().unwrap();
    client.refresh().await.unwrap();
    assert_eq!(client.zones().len(), 2);

    // Second snapshot lacks zone 2's config; its previous state is kept.
    let err = client.refresh().await.unwrap_err();
    assert!(matches!(err, infinitude::Error::MissingField(_)));
    assert_eq!(client.zones().len(), 2);

    client.set_operating_mode(OperatingMode::Cool).await.unwrap();
    assert_eq!(client.zone(1).unwrap().operating_mode, OperatingMode::Cool);

    client.set_away(2, true).await.unwrap();
}

#[tokio::test]
async fn commands_before_refresh_are_invalid_zone() {
    let client_builder = InfinitudeClient::builder("127.0.0.1").port(9);
    let mut client = client_builder.build().unwrap();
    let err = client.set_fan_mode(1, FanMode::Low).await.unwrap_err();
    assert!(matches!(err, infinitude::Error::InvalidZone(1)));
}

#[tokio::test]
async fn snapshot_callback_fires_on_refresh_and_update() {
    let server = MockServer::start().await;
    mount_snapshot(&server, "active_heat", "heat").await;
    Mock::given(method("POST"))
        .and(path("/api/config/zones/1/"))
        .respond_with(ok())
        .mount(&server)
        .await;

    let presets: Arc<Mutex<Vec<Preset>>> = Arc::new(Mutex::new(vec![]));
    let presets_clone = presets.clone();
    let mut client = builder_for(&server)
        .on_snapshot(move |zone| {
            presets_clone.lock().unwrap().push(zone.preset);
        })
        .build()
        .unwrap();

    client.refresh().await.unwrap();
    client.set_preset_mode(1, Preset::Hold).await.unwrap();

    let captured = presets.lock().unwrap();
    assert_eq!(*captured, vec![Preset::Away, Preset::Hold]);
}

#[tokio::test]
async fn message_log_records_traffic() {
    let server = MockServer::start().await;
    mount_snapshot(&server, "idle", "heat").await;
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let log_path = tmp.path().to_str().unwrap().to_string();

    let mut client = builder_for(&server)
        .message_log(MessageLogMode::Full, &log_path)
        .build()
        .unwrap();
    client.refresh().await.unwrap();

    let contents = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0]["dir"], "req");
    assert_eq!(lines[0]["path"], "/api/status");
    assert_eq!(lines[3]["dir"], "resp");
    assert_eq!(lines[3]["path"], "/api/config");
    assert!(lines[3]["body"]["data"].is_object());
}
