//! Account operations: signup, login, profile, password, logout.

// self
use crate::{
	_prelude::*,
	auth::{CredentialPair, TokenSecret},
	gateway::Gateway,
	http::{ApiRequest, FormPart, HttpTransport},
	services::{self, ValidationError},
};

const SIGNUP_PATH: &str = "user/signup/";
const LOGIN_PATH: &str = "user/login/";
const DETAILS_PATH: &str = "user/details/";

/// New account submitted to the signup endpoint.
#[derive(Clone, Serialize)]
pub struct SignUpRequest {
	/// Login email; must be unique on the server.
	pub email: String,
	/// Display handle; must be unique on the server.
	pub username: String,
	/// Given name.
	pub first_name: String,
	/// Family name.
	pub last_name: String,
	/// Password; at least [`MIN_PASSWORD_LEN`](services::MIN_PASSWORD_LEN) characters.
	pub password: String,
	/// Must equal `password`; never sent.
	#[serde(skip)]
	pub confirm_password: String,
}
impl SignUpRequest {
	/// Runs the checks the signup page applies before submitting.
	pub fn validate(&self) -> Result<(), ValidationError> {
		services::require("email", &self.email)?;
		services::require("username", &self.username)?;
		services::require("first_name", &self.first_name)?;
		services::require("last_name", &self.last_name)?;
		services::check_new_password(&self.password, &self.confirm_password)
	}
}
impl Debug for SignUpRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignUpRequest")
			.field("email", &self.email)
			.field("username", &self.username)
			.field("first_name", &self.first_name)
			.field("last_name", &self.last_name)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Email/password credentials for the login endpoint.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
	/// Account email.
	pub email: String,
	/// Account password.
	pub password: String,
}
impl LoginRequest {
	/// Creates a login request.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}
impl Debug for LoginRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginRequest")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Identity returned alongside a successful login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
	/// Account email.
	pub email: String,
	/// Display handle, when set.
	#[serde(default)]
	pub username: Option<String>,
}

/// Profile returned by the user details endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Server-side identifier.
	#[serde(default)]
	pub id: Option<u64>,
	/// Account email.
	pub email: String,
	/// Display handle, when set.
	#[serde(default)]
	pub username: Option<String>,
	/// Given name.
	#[serde(default)]
	pub first_name: String,
	/// Family name.
	#[serde(default)]
	pub last_name: String,
	/// URL of the profile picture, when the server includes one.
	#[serde(default)]
	pub profile_pic: Option<String>,
}

/// Image uploaded as the profile picture.
#[derive(Clone, PartialEq, Eq)]
pub struct ProfilePicture {
	/// File name reported to the server.
	pub file_name: String,
	/// MIME type, for example `image/jpeg`.
	pub content_type: String,
	/// Raw image bytes.
	pub bytes: Vec<u8>,
}
impl ProfilePicture {
	/// JPEG upload named the way the profile page names it.
	pub fn jpeg(bytes: impl Into<Vec<u8>>) -> Self {
		Self {
			file_name: "profile-picture.jpg".into(),
			content_type: "image/jpeg".into(),
			bytes: bytes.into(),
		}
	}
}
impl Debug for ProfilePicture {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProfilePicture")
			.field("file_name", &self.file_name)
			.field("content_type", &self.content_type)
			.field("len", &self.bytes.len())
			.finish()
	}
}

/// Profile edit sent as multipart form data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileUpdate {
	/// Given name.
	pub first_name: String,
	/// Family name.
	pub last_name: String,
	/// Display handle.
	pub username: String,
	/// Account email.
	pub email: String,
	/// New picture; the current one is kept when `None`.
	pub profile_picture: Option<ProfilePicture>,
}
impl ProfileUpdate {
	fn into_parts(self) -> Vec<FormPart> {
		let mut parts = vec![
			FormPart::text("first_name", self.first_name),
			FormPart::text("last_name", self.last_name),
			FormPart::text("username", self.username),
			FormPart::text("email", self.email),
		];

		if let Some(picture) = self.profile_picture {
			parts.push(FormPart::File {
				name: "profile_pic".into(),
				file_name: picture.file_name,
				content_type: picture.content_type,
				bytes: picture.bytes,
			});
		}

		parts
	}
}

/// Password change sent as multipart form data.
#[derive(Clone)]
pub struct PasswordChange {
	/// Password currently set.
	pub current_password: String,
	/// Replacement password.
	pub new_password: String,
	/// Must equal `new_password`; never sent.
	pub confirm_password: String,
}
impl PasswordChange {
	/// Runs the checks the profile page applies before submitting.
	pub fn validate(&self) -> Result<(), ValidationError> {
		services::require("current_password", &self.current_password)?;
		services::check_new_password(&self.new_password, &self.confirm_password)
	}
}
impl Debug for PasswordChange {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("PasswordChange(<redacted>)")
	}
}

#[derive(Deserialize)]
struct MessageBody {
	message: String,
}

#[derive(Deserialize)]
struct LoginBody {
	access: TokenSecret,
	refresh: TokenSecret,
	user: UserSummary,
}

/// Account operations against the user endpoints.
pub struct UserService<T>
where
	T: ?Sized + HttpTransport,
{
	gateway: Gateway<T>,
}
impl<T> UserService<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates a service that sends through `gateway`.
	pub fn new(gateway: Gateway<T>) -> Self {
		Self { gateway }
	}

	/// Gateway this service sends through.
	pub fn gateway(&self) -> &Gateway<T> {
		&self.gateway
	}

	/// Registers a new account and returns the server's confirmation message.
	pub async fn register(&self, request: &SignUpRequest) -> Result<String> {
		services::observe("register", self.submit_signup(request)).await
	}

	/// Exchanges credentials for a token pair, stores it, and returns who logged in.
	pub async fn login(&self, request: &LoginRequest) -> Result<UserSummary> {
		services::observe("login", self.submit_login(request)).await
	}

	/// Fetches the profile of the logged-in user.
	pub async fn current_user(&self) -> Result<UserProfile> {
		services::observe("current_user", self.fetch_details()).await
	}

	/// Loads the profile when an access token is stored, as the app does on start-up.
	///
	/// Returns `Ok(None)` without any request when no token is stored.
	pub async fn restore_session(&self) -> Result<Option<UserProfile>> {
		if self.gateway.store.access_token().await?.is_none() {
			return Ok(None);
		}

		self.current_user().await.map(Some)
	}

	/// Replaces profile fields and, optionally, the profile picture.
	pub async fn update_profile(&self, update: ProfileUpdate) -> Result<UserProfile> {
		services::observe("update_profile", self.submit_profile(update)).await
	}

	/// Changes the account password.
	pub async fn update_password(&self, change: &PasswordChange) -> Result<()> {
		services::observe("update_password", self.submit_password(change)).await
	}

	/// Logs out locally. The caller decides where to navigate.
	pub async fn logout(&self) -> Result<()> {
		self.gateway.end_session().await
	}

	async fn submit_signup(&self, request: &SignUpRequest) -> Result<String> {
		request.validate()?;

		let response = self.gateway.send(ApiRequest::post(SIGNUP_PATH).with_json(request)?).await?;

		Ok(response.json::<MessageBody>()?.message)
	}

	async fn submit_login(&self, request: &LoginRequest) -> Result<UserSummary> {
		services::require("email", &request.email)?;
		services::require("password", &request.password)?;

		let response = self.gateway.send(ApiRequest::post(LOGIN_PATH).with_json(request)?).await?;
		let body = response.json::<LoginBody>()?;

		self.gateway.establish_session(CredentialPair::new(body.access, body.refresh)).await?;

		Ok(body.user)
	}

	async fn fetch_details(&self) -> Result<UserProfile> {
		let response = self.gateway.send(ApiRequest::get(DETAILS_PATH)).await?;

		Ok(response.json::<UserProfile>()?)
	}

	async fn submit_profile(&self, update: ProfileUpdate) -> Result<UserProfile> {
		services::require("email", &update.email)?;
		services::require("username", &update.username)?;

		let request = ApiRequest::put(DETAILS_PATH).with_form(update.into_parts());
		let response = self.gateway.send(request).await?;

		Ok(response.json::<UserProfile>()?)
	}

	async fn submit_password(&self, change: &PasswordChange) -> Result<()> {
		change.validate()?;

		let request = ApiRequest::patch(DETAILS_PATH).with_form(vec![
			FormPart::text("current_password", change.current_password.as_str()),
			FormPart::text("new_password", change.new_password.as_str()),
		]);

		self.gateway.send(request).await?;

		Ok(())
	}
}
impl<T> Clone for UserService<T>
where
	T: ?Sized + HttpTransport,
{
	fn clone(&self) -> Self {
		Self { gateway: self.gateway.clone() }
	}
}
impl<T> Debug for UserService<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("UserService").field("gateway", &self.gateway).finish()
	}
}
