//! HTTP behaviour through the transport-free router

mod common;

use anyhow::Result;
use serde_json::{json, Value};
use skillsheet::server::{route_request, HttpRequest, ServerState};

struct Api {
    state: ServerState,
}

impl Api {
    fn new() -> Result<Self> {
        Ok(Self {
            state: ServerState::new(common::seeded()?, 1 << 20),
        })
    }

    fn call(&self, method: &str, path: &str, body: Option<Value>) -> Result<(u16, Value)> {
        let mut request = HttpRequest::new(method, path);
        if let Some(body) = body {
            request = request.with_json(&body);
        }
        let response = route_request(&request, &self.state);
        Ok((response.status, serde_json::from_slice(&response.body)?))
    }

    fn get(&self, path: &str) -> Result<(u16, Value)> {
        self.call("GET", path, None)
    }

    fn post(&self, path: &str, body: Value) -> Result<(u16, Value)> {
        self.call("POST", path, Some(body))
    }

    fn engineer(&self, handle: &str) -> Result<String> {
        let (status, body) = self.post(
            "/engineers",
            json!({
                "userIdentifier": handle,
                "name": handle,
                "email": format!("{handle}@example.com"),
            }),
        )?;
        assert_eq!(status, 201, "{body}");
        Ok(body["data"]["id"].as_str().unwrap_or_default().to_string())
    }

    fn career(&self, engineer_id: &str) -> Result<String> {
        let (status, body) = self.post(
            &format!("/engineers/{engineer_id}/career-histories"),
            json!({"title": "Order management", "startedAt": "2022-04-01"}),
        )?;
        assert_eq!(status, 201, "{body}");
        Ok(body["data"]["id"].as_str().unwrap_or_default().to_string())
    }
}

fn process_ids(body: &Value) -> Vec<i64> {
    body["data"]
        .as_array()
        .map(|links| links.iter().filter_map(|link| link["processId"].as_i64()).collect())
        .unwrap_or_default()
}

#[test]
fn qualification_upsert_then_delete() -> Result<()> {
    let api = Api::new()?;
    let engineer_id = api.engineer("hana")?;
    let path = format!("/engineers/{engineer_id}/qualifications");
    let tuple = json!({"qualificationId": "cert-1", "acquiredAt": "2023-06-15"});

    let (status, body) = api.post(&path, tuple.clone())?;
    assert_eq!(status, 201);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"][0]["outcome"], "created");
    assert_eq!(body["message"], "1 engineer qualifications processed");

    let (status, body) = api.post(&path, tuple)?;
    assert_eq!(status, 201);
    assert_eq!(body["data"][0]["outcome"], "unchanged");
    assert_eq!(body["data"][0]["acquiredAt"], "2023-06-15");

    let (_, body) = api.get(&path)?;
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"][0]["qualification"]["name"], "Certificate One");

    let (status, body) = api.call("DELETE", &path, Some(json!({"qualificationIds": ["cert-1"]})))?;
    assert_eq!(status, 200);
    assert_eq!(body["deletedCount"], 1);

    let (status, body) = api.get(&path)?;
    assert_eq!(status, 200);
    assert_eq!(body["data"], json!([]));
    Ok(())
}

#[test]
fn put_is_an_alias_for_merge() -> Result<()> {
    let api = Api::new()?;
    let engineer_id = api.engineer("ichiro")?;
    let path = format!("/engineers/{engineer_id}/skills");

    let (status, body) = api.call(
        "PUT",
        &path,
        Some(json!({"skills": [{"skillId": "a", "version": "5"}, {"skillId": "b"}]})),
    )?;
    assert_eq!(status, 201);
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["skill"]["category"]["id"], "lang");
    Ok(())
}

#[test]
fn replace_overwrites_the_process_set() -> Result<()> {
    let api = Api::new()?;
    let career_id = api.career(&api.engineer("jun")?)?;
    let path = format!("/career-histories/{career_id}/processes");

    api.post(&path, json!({"processIds": [1, 2, 3]}))?;
    let (status, body) = api.post(&path, json!({"referenceIds": [2, 4]}))?;
    assert_eq!(status, 201);
    assert_eq!(body["message"], "2 career processes set");

    let (_, body) = api.get(&path)?;
    assert_eq!(process_ids(&body), vec![2, 4]);
    Ok(())
}

#[test]
fn failed_replace_reports_missing_and_keeps_links() -> Result<()> {
    let api = Api::new()?;
    let career_id = api.career(&api.engineer("kei")?)?;
    let path = format!("/career-histories/{career_id}/processes");
    api.post(&path, json!({"processIds": [1, 3]}))?;

    let (status, body) = api.post(&path, json!({"processIds": [2, 99]}))?;
    assert_eq!(status, 404);
    assert_eq!(body["success"], false);
    assert_eq!(body["notFoundProcesses"], json!([99]));
    assert_eq!(body["notFoundIds"], json!([99]));

    let (_, body) = api.get(&path)?;
    assert_eq!(process_ids(&body), vec![1, 3]);
    Ok(())
}

#[test]
fn bulk_delete_counts_only_existing_links() -> Result<()> {
    let api = Api::new()?;
    let career_id = api.career(&api.engineer("leo")?)?;
    let path = format!("/career-histories/{career_id}/processes");
    api.post(&path, json!({"processIds": [5]}))?;

    let (status, body) = api.call("DELETE", &path, Some(json!({"processIds": [5, 777]})))?;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["deletedCount"], 1);
    Ok(())
}

#[test]
fn multi_id_reads_report_exact_misses() -> Result<()> {
    let api = Api::new()?;

    let (status, body) = api.get("/skills/a,b,z")?;
    assert_eq!(status, 404);
    assert_eq!(body["notFoundIds"], json!(["z"]));
    let found: Vec<&str> = body["data"]
        .as_array()
        .map(|skills| skills.iter().filter_map(|s| s["id"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(found, vec!["a", "b"]);

    let (status, body) = api.get("/skills/a")?;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["id"], "a");

    let (status, body) = api.get("/skills/a,b")?;
    assert_eq!(status, 200);
    assert!(body["data"].is_array());

    let (_, body) = api.get("/skills/a%2Cb")?;
    assert_eq!(body["count"], 2);

    let (status, body) = api.get("/skills/z")?;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Skill not found");
    Ok(())
}

#[test]
fn master_collections_are_ordered() -> Result<()> {
    let api = Api::new()?;

    let (_, body) = api.get("/qualifications")?;
    assert_eq!(body["data"][0]["id"], "cert-2");
    assert_eq!(body["data"][0]["isNational"], true);

    let (_, body) = api.get("/processes")?;
    assert_eq!(body["count"], 7);
    assert_eq!(body["data"][6]["name"], "Retrospective");

    let (status, body) = api.get("/skills/categories/lang")?;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["label"], "Languages");
    Ok(())
}

#[test]
fn link_requests_are_gated_and_validated() -> Result<()> {
    let api = Api::new()?;

    let (status, body) = api.get("/engineers/ghost/skills")?;
    assert_eq!(status, 404);
    assert_eq!(body["notFoundIds"], json!(["ghost"]));

    let engineer_id = api.engineer("mio")?;
    let (status, body) = api.post(
        &format!("/engineers/{engineer_id}/qualifications"),
        json!({"qualifications": [{"qualificationId": "cert-1", "acquiredAt": "June"}]}),
    )?;
    assert_eq!(status, 400);
    assert_eq!(body["details"][0]["path"], "qualifications[0].acquiredAt");
    Ok(())
}

#[test]
fn engineer_lifecycle() -> Result<()> {
    let api = Api::new()?;
    let first = api.engineer("nao")?;
    let second = api.engineer("oki")?;

    let (status, body) = api.post(
        "/engineers",
        json!({"userIdentifier": "nao", "name": "Other", "email": "other@example.com"}),
    )?;
    assert_eq!(status, 409);
    assert_eq!(body["success"], false);

    let (status, body) = api.get(&format!("/engineers/{first},{second},ghost"))?;
    assert_eq!(status, 404);
    assert_eq!(body["count"], 2);
    assert_eq!(body["notFoundIds"], json!(["ghost"]));

    let ids = format!("/engineers/{first},{second}");
    let (status, _) = api.call("PUT", &ids, Some(json!([{"specialty": "Backend"}])))?;
    assert_eq!(status, 400);

    let (status, body) = api.call(
        "PUT",
        &ids,
        Some(json!([{"specialty": "Backend"}, {"status": "inProject"}])),
    )?;
    assert_eq!(status, 200);
    assert_eq!(body["data"][0]["specialty"], "Backend");
    assert_eq!(body["data"][1]["status"], "inProject");

    let (status, _) = api.call("DELETE", &format!("{ids},ghost"), None)?;
    assert_eq!(status, 404);
    let (_, body) = api.get("/engineers")?;
    assert_eq!(body["count"], 2);

    let (status, body) = api.call("DELETE", &ids, None)?;
    assert_eq!(status, 200);
    assert_eq!(body["deletedCount"], 2);
    Ok(())
}

#[test]
fn career_detail_embeds_links() -> Result<()> {
    let api = Api::new()?;
    let engineer_id = api.engineer("ren")?;

    let (status, body) = api.post(
        &format!("/engineers/{engineer_id}/career-histories"),
        json!({"careerHistories": [
            {"title": "Inventory", "startedAt": "2019-04-01", "endedAt": "2020-03-31"},
            {"title": "Billing", "startedAt": "2021-04-01"}
        ]}),
    )?;
    assert_eq!(status, 201);
    assert_eq!(body["count"], 2);
    let billing = body["data"][1]["id"].as_str().unwrap_or_default().to_string();

    api.post(
        &format!("/career-histories/{billing}/skills"),
        json!({"skillId": "c", "version": "3.12"}),
    )?;
    api.post(&format!("/career-histories/{billing}/processes"), json!({"processIds": [4]}))?;

    let (status, body) = api.get(&format!("/career-histories/{billing}"))?;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["title"], "Billing");
    assert_eq!(body["data"]["skills"][0]["skillId"], "c");
    assert_eq!(body["data"]["skills"][0]["version"], "3.12");
    assert_eq!(body["data"]["processes"][0]["process"]["name"], "Implementation");

    let (_, body) = api.get(&format!("/engineers/{engineer_id}/career-histories"))?;
    assert_eq!(body["data"][0]["title"], "Billing");
    assert_eq!(body["data"][1]["title"], "Inventory");
    Ok(())
}

#[test]
fn link_batches_beyond_sqlite_bind_limit() -> Result<()> {
    let api = Api::new()?;
    let engineer_id = api.engineer("sora")?;
    let path = format!("/engineers/{engineer_id}/skills");
    api.post(&path, json!({"skillId": "a"}))?;

    let unknown: Vec<String> = (0..40_000).map(|n| format!("ghost-{n}")).collect();

    let tuples: Vec<Value> = unknown.iter().map(|id| json!({"skillId": id})).collect();
    let (status, body) = api.post(&path, json!({"skills": tuples}))?;
    assert_eq!(status, 404);
    assert_eq!(body["notFoundIds"].as_array().map(Vec::len), Some(40_000));

    let mut ids = unknown;
    ids.push("a".to_string());
    let (status, body) = api.call("DELETE", &path, Some(json!({"skillIds": ids})))?;
    assert_eq!(status, 200);
    assert_eq!(body["deletedCount"], 1);
    Ok(())
}

#[test]
fn process_ids_are_read_as_numbers() -> Result<()> {
    let api = Api::new()?;

    let (status, body) = api.get("/processes/01")?;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["id"], 1);

    let (status, body) = api.get("/processes/1,02")?;
    assert_eq!(status, 200);
    assert_eq!(body["count"], 2);
    assert!(body.get("notFoundIds").is_none());

    let (status, body) = api.get("/processes/2,zz")?;
    assert_eq!(status, 404);
    assert_eq!(body["notFoundIds"], json!(["zz"]));
    Ok(())
}

#[test]
fn skill_tags_and_tag_maps() -> Result<()> {
    let api = Api::new()?;

    let (status, body) = api.get("/skills/tags")?;
    assert_eq!(status, 200);
    assert_eq!(body["data"][0]["id"], "infra");
    assert_eq!(body["data"][0]["skills"], json!([]));
    assert_eq!(body["data"][1]["skills"][1]["id"], "b");

    let (status, body) = api.get("/skills/tags/web")?;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["label"], "Web");

    let (status, body) = api.get("/skills/tags/web,nope")?;
    assert_eq!(status, 404);
    assert_eq!(body["error"], "Some tags not found");
    assert_eq!(body["notFoundIds"], json!(["nope"]));

    let (_, body) = api.get("/skills/tag-maps?tagId=web")?;
    assert_eq!(body["count"], 2);
    let (_, body) = api.get("/skills/tag-maps?skillId=b")?;
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["tag"]["label"], "Web");
    assert_eq!(body["data"][0]["skill"]["categoryId"], "lang");

    let (_, body) = api.get("/skills/a")?;
    assert_eq!(body["data"]["tags"][0]["id"], "web");

    let engineer_id = api.engineer("taro")?;
    let path = format!("/engineers/{engineer_id}/skills");
    api.post(&path, json!({"skillId": "b", "version": "2"}))?;
    let (_, body) = api.get(&path)?;
    assert_eq!(body["data"][0]["skill"]["tags"][0]["id"], "web");
    Ok(())
}
